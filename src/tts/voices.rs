//! Piper voice catalog.
//!
//! A voice is installed as a pair of files sharing a prefix:
//! `<id>-<quality>.onnx` and `<id>-<quality>.onnx.json`, e.g.
//! `en_GB-jarvis-medium.onnx`.  The voice id is everything before the last
//! `-`.

use std::path::{Path, PathBuf};

use super::TtsError;

/// Model and config file for one voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceFiles {
    pub model: PathBuf,
    pub config: PathBuf,
}

fn file_names(dir: &Path) -> Result<Vec<String>, TtsError> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map_err(|source| TtsError::VoicesDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

fn is_model(name: &str) -> bool {
    name.ends_with(".onnx")
}

fn is_config(name: &str) -> bool {
    name.ends_with(".onnx.json")
}

/// Sorted, de-duplicated voice ids installed in `dir`.
pub fn list_voice_ids(dir: &Path) -> Result<Vec<String>, TtsError> {
    let mut ids: Vec<String> = file_names(dir)?
        .iter()
        .filter(|n| is_model(n))
        .filter_map(|n| n.rsplit_once('-').map(|(base, _)| base.to_string()))
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Resolve `voice_id` to its model/config pair.
///
/// # Errors
///
/// [`TtsError::VoiceNotFound`] when either file is missing.
pub fn find_voice_files(dir: &Path, voice_id: &str) -> Result<VoiceFiles, TtsError> {
    let prefix = format!("{voice_id}-");
    let names = file_names(dir)?;
    let matching = || names.iter().filter(|n| n.starts_with(&prefix));

    let model = matching().find(|n| is_model(n));
    let config = matching().find(|n| is_config(n));

    match (model, config) {
        (Some(model), Some(config)) => Ok(VoiceFiles {
            model: dir.join(model),
            config: dir.join(config),
        }),
        _ => Err(TtsError::VoiceNotFound(voice_id.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn voices_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            fs::write(dir.path().join(f), b"").unwrap();
        }
        dir
    }

    #[test]
    fn ids_are_sorted_and_unique() {
        let dir = voices_dir(&[
            "en_US-ryan-high.onnx",
            "en_US-ryan-high.onnx.json",
            "en_GB-jarvis-medium.onnx",
            "en_GB-jarvis-medium.onnx.json",
            "en_GB-jarvis-low.onnx",
            "README.txt",
        ]);
        assert_eq!(
            list_voice_ids(dir.path()).unwrap(),
            vec!["en_GB-jarvis".to_string(), "en_US-ryan".to_string()]
        );
    }

    #[test]
    fn finds_model_and_config_pair() {
        let dir = voices_dir(&["en_GB-jarvis-medium.onnx", "en_GB-jarvis-medium.onnx.json"]);
        let files = find_voice_files(dir.path(), "en_GB-jarvis").unwrap();
        assert_eq!(files.model, dir.path().join("en_GB-jarvis-medium.onnx"));
        assert_eq!(files.config, dir.path().join("en_GB-jarvis-medium.onnx.json"));
    }

    #[test]
    fn missing_config_is_not_found() {
        let dir = voices_dir(&["en_GB-jarvis-medium.onnx"]);
        let err = find_voice_files(dir.path(), "en_GB-jarvis").unwrap_err();
        assert!(matches!(err, TtsError::VoiceNotFound(id) if id == "en_GB-jarvis"));
    }

    #[test]
    fn prefix_must_end_at_a_dash() {
        let dir = voices_dir(&["en_GB-jarvis2-medium.onnx", "en_GB-jarvis2-medium.onnx.json"]);
        assert!(find_voice_files(dir.path(), "en_GB-jarvis").is_err());
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = list_voice_ids(Path::new("/nonexistent/voices")).unwrap_err();
        assert!(matches!(err, TtsError::VoicesDir { .. }));
    }
}
