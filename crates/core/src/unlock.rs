//! Bulk password removal.

use pdf_engine::{EncryptionMode, OpenSource, PdfDocument, PdfEngine, PdfEngineError, SaveOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("not password protected")]
    NotEncrypted,

    #[error("incorrect password")]
    WrongPassword,

    #[error("failed to open: {0}")]
    Open(#[source] PdfEngineError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: PdfEngineError,
    },
}

/// Per-file outcome of a bulk unlock, in input order.
#[derive(Debug, Default)]
pub struct UnlockReport {
    pub results: Vec<(PathBuf, Result<PathBuf, UnlockError>)>,
}

impl UnlockReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, result)| result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// `<stem>_unprotected.<ext>` beside `path`.
pub fn unprotected_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_unprotected.{}", ext.to_string_lossy()),
        None => format!("{stem}_unprotected"),
    };
    path.with_file_name(name)
}

/// Writes an unprotected copy of every encrypted file in `paths`.
///
/// Copies land beside their source, or in `output_dir` when given. One
/// file failing never stops the others.
pub fn remove_passwords<E: PdfEngine>(
    engine: &E,
    paths: &[PathBuf],
    password: &str,
    output_dir: Option<&Path>,
) -> UnlockReport {
    let mut report = UnlockReport::default();
    for path in paths {
        let result = unlock_one(engine, path, password, output_dir);
        match &result {
            Ok(out) => tracing::info!(path = %path.display(), out = %out.display(), "password removed"),
            Err(err) => tracing::warn!(path = %path.display(), %err, "password not removed"),
        }
        report.results.push((path.clone(), result));
    }
    report
}

fn unlock_one<E: PdfEngine>(
    engine: &E,
    path: &Path,
    password: &str,
    output_dir: Option<&Path>,
) -> Result<PathBuf, UnlockError> {
    let mut document = match engine.open(OpenSource::from(path), Some(password)) {
        Ok(document) => document,
        Err(PdfEngineError::WrongPassword | PdfEngineError::PasswordRequired) => {
            return Err(UnlockError::WrongPassword)
        }
        Err(other) => return Err(UnlockError::Open(other)),
    };
    if !document.is_encrypted() {
        return Err(UnlockError::NotEncrypted);
    }

    let mut out = unprotected_path(path);
    if let (Some(dir), Some(name)) = (output_dir, out.file_name()) {
        out = dir.join(name);
    }
    let options = SaveOptions { compress: true, encryption: EncryptionMode::Remove };
    document
        .save(&out, &options)
        .map_err(|source| UnlockError::Write { path: out.clone(), source })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::RecordingEngine;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"%PDF").expect("write");
        path
    }

    #[test]
    fn unprotected_path_keeps_extension() {
        assert_eq!(
            unprotected_path(Path::new("/docs/contract.pdf")),
            PathBuf::from("/docs/contract_unprotected.pdf")
        );
        assert_eq!(unprotected_path(Path::new("notes")), PathBuf::from("notes_unprotected"));
    }

    #[test]
    fn encrypted_files_are_written_unprotected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = touch(dir.path(), "a.pdf");
        let b = touch(dir.path(), "b.pdf");
        let engine = RecordingEngine::new(1).with_password("pw");

        let report = remove_passwords(&engine, &[a, b], "pw", None);
        assert_eq!(report.succeeded(), 2);
        let outputs: Vec<_> = report.results.iter().map(|(_, r)| r.as_ref().ok().cloned()).collect();
        assert_eq!(outputs[0], Some(dir.path().join("a_unprotected.pdf")));
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = touch(dir.path(), "present.pdf");
        let missing = dir.path().join("missing.pdf");
        let engine = RecordingEngine::new(1).with_password("pw");

        let report = remove_passwords(&engine, &[missing, present.clone()], "pw", None);
        assert_eq!((report.succeeded(), report.failed()), (1, 1));
        assert!(matches!(report.results[0].1, Err(UnlockError::Open(_))));
        assert_eq!(report.results[1].0, present);
    }

    #[test]
    fn wrong_password_and_plain_files_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = touch(dir.path(), "doc.pdf");

        let locked = RecordingEngine::new(1).with_password("right");
        let report = remove_passwords(&locked, &[file.clone()], "wrong", None);
        assert!(matches!(report.results[0].1, Err(UnlockError::WrongPassword)));

        let plain = RecordingEngine::new(1);
        let report = remove_passwords(&plain, &[file], "anything", None);
        assert!(matches!(report.results[0].1, Err(UnlockError::NotEncrypted)));
    }

    #[test]
    fn output_dir_redirects_copies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = tempfile::tempdir().expect("tempdir");
        let file = touch(dir.path(), "doc.pdf");
        let engine = RecordingEngine::new(1).with_password("pw");

        let report = remove_passwords(&engine, &[file], "pw", Some(out_dir.path()));
        let out = report.results[0].1.as_ref().expect("unlocked");
        assert_eq!(out, &out_dir.path().join("doc_unprotected.pdf"));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = touch(dir.path(), "doc.pdf");
        let engine = RecordingEngine::new(1).with_password("pw").with_save_error("disk full");

        let report = remove_passwords(&engine, &[file], "pw", None);
        assert!(matches!(report.results[0].1, Err(UnlockError::Write { .. })));
    }
}
