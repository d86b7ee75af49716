use std::path::Path;

use anyhow::Context;

use crate::classifier::BandScheme;

/// Resolve the band scheme from a JSON file or a preset name, falling back to
/// the canonical scheme when neither is given.
pub fn load_scheme(preset: Option<&str>, file: Option<&Path>) -> anyhow::Result<BandScheme> {
    if let Some(path) = file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scheme file {}", path.display()))?;
        let scheme: BandScheme = serde_json::from_str(&raw)
            .with_context(|| format!("invalid scheme file {}", path.display()))?;
        log::info!("Loaded band scheme from {}", path.display());
        return Ok(scheme);
    }

    let name = preset.unwrap_or("canonical");
    Ok(BandScheme::preset(name)?)
}

/// Accepts a single-byte delimiter, or `tab` / `\t`.
pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        other => Err(format!("delimiter must be a single ASCII character, got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_to_canonical() {
        assert_eq!(load_scheme(None, None).unwrap(), BandScheme::canonical());
        assert_eq!(load_scheme(Some("forty"), None).unwrap(), BandScheme::forty());
        assert!(load_scheme(Some("hourly"), None).is_err());
    }

    #[test]
    fn loads_scheme_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"cycle_length": 20, "na_threshold": 20, "band_upper_bounds": [9, 18], "reject_zero": true}}"#
        )
        .unwrap();

        let scheme = load_scheme(None, Some(file.path())).unwrap();
        assert_eq!(scheme.cycle_length(), 20);
        assert_eq!(scheme.max_level(), 2);
        assert!(scheme.classify(0).is_err());
    }

    #[test]
    fn rejects_invalid_scheme_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"cycle_length": 0, "na_threshold": 0, "band_upper_bounds": []}}"#
        )
        .unwrap();
        assert!(load_scheme(None, Some(file.path())).is_err());
    }

    #[test]
    fn delimiters() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter("||").is_err());
    }
}
