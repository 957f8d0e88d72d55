//! Trust boundary for client-supplied paths.
//!
//! Every path a client sends back (the upload location, an artifact URL) is
//! untrusted. [`PathValidator`] resolves it lexically, confines it to the
//! [`TrustedRoot`] and checks the file type before anything is handed to
//! FFmpeg.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{MediaError, MediaResult};

/// Subdirectory holding uploaded source videos.
pub const UPLOADS_DIR: &str = "uploads";
/// Subdirectory holding per-video frame directories.
pub const FRAMES_DIR: &str = "frames";
/// Subdirectory holding trimmed clips.
pub const TRIMMED_DIR: &str = "trimmed";

/// The single directory all accepted and produced paths must live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedRoot {
    path: PathBuf,
}

impl TrustedRoot {
    /// Build a root from configuration. Relative roots are resolved against
    /// `base_dir` (the working directory captured at startup).
    pub fn new(root: impl AsRef<Path>, base_dir: impl AsRef<Path>) -> MediaResult<Self> {
        let root = root.as_ref();
        let joined = if root.is_absolute() {
            root.to_path_buf()
        } else {
            base_dir.as_ref().join(root)
        };
        let path = normalize_lexically(&joined);

        if !path.is_absolute() || path.parent().is_none() {
            return Err(MediaError::invalid_input(format!(
                "Trusted root must be an absolute, non-root directory: {}",
                path.display()
            )));
        }

        Ok(Self { path })
    }

    /// Absolute, normalized root path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when `candidate` is strictly below the root.
    ///
    /// The comparison is component-wise, so a sibling such as
    /// `/srv/data-evil` never matches a root of `/srv/data`.
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate != self.path && candidate.starts_with(&self.path)
    }

    /// Path of `candidate` relative to the root, if it lives inside it.
    pub fn relative<'a>(&self, candidate: &'a Path) -> Option<&'a Path> {
        if self.contains(candidate) {
            candidate.strip_prefix(&self.path).ok()
        } else {
            None
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.path.join(UPLOADS_DIR)
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.path.join(FRAMES_DIR)
    }

    pub fn trimmed_dir(&self) -> PathBuf {
        self.path.join(TRIMMED_DIR)
    }
}

/// A path that passed validation and is safe to hand to FFmpeg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    path: PathBuf,
}

impl VideoRef {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base filename without extension, used to derive artifact names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Validates client-supplied paths against the trusted root and an
/// extension allow-list.
#[derive(Debug, Clone)]
pub struct PathValidator {
    root: TrustedRoot,
    base_dir: PathBuf,
    allowed_extensions: HashSet<String>,
}

impl PathValidator {
    /// Create a validator accepting `.mp4` inputs. Relative candidates are
    /// resolved against `base_dir`.
    pub fn new(root: TrustedRoot, base_dir: impl Into<PathBuf>) -> Self {
        let mut allowed_extensions = HashSet::new();
        allowed_extensions.insert("mp4".to_string());

        Self {
            root,
            base_dir: base_dir.into(),
            allowed_extensions,
        }
    }

    pub fn root(&self) -> &TrustedRoot {
        &self.root
    }

    /// Resolve `candidate` to an absolute path without touching the filesystem.
    pub fn resolve(&self, candidate: &str) -> PathBuf {
        let candidate = Path::new(candidate);
        if candidate.is_absolute() {
            normalize_lexically(candidate)
        } else {
            normalize_lexically(&self.base_dir.join(candidate))
        }
    }

    /// Validate a source video path.
    ///
    /// Checks run in a fixed order: input shape, trust boundary, existence,
    /// symlink escape, extension. Only the resolved path is returned.
    pub fn validate(&self, candidate: &str) -> MediaResult<VideoRef> {
        check_shape(candidate)?;

        let resolved = self.resolve(candidate);
        if !self.root.contains(&resolved) {
            warn!(path = %resolved.display(), "Rejected path outside trusted root");
            return Err(MediaError::AccessDenied(resolved));
        }

        self.check_existing_file(&resolved)?;

        let extension = resolved
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(MediaError::UnsupportedType(if extension.is_empty() {
                "missing extension".to_string()
            } else {
                format!(".{}", extension)
            }));
        }

        Ok(VideoRef { path: resolved })
    }

    /// Resolve an artifact path given relative to the root (as it appears in
    /// public URLs). No extension policy applies.
    pub fn resolve_artifact(&self, relative: &str) -> MediaResult<PathBuf> {
        check_shape(relative)?;

        if Path::new(relative).is_absolute() {
            return Err(MediaError::AccessDenied(PathBuf::from(relative)));
        }

        let resolved = normalize_lexically(&self.root.path().join(relative));
        if !self.root.contains(&resolved) {
            warn!(path = %resolved.display(), "Rejected artifact path outside trusted root");
            return Err(MediaError::AccessDenied(resolved));
        }

        self.check_existing_file(&resolved)?;
        Ok(resolved)
    }

    /// Existence plus a canonical containment check, so a symlink inside the
    /// root cannot point at a file outside it.
    fn check_existing_file(&self, resolved: &Path) -> MediaResult<()> {
        match fs::metadata(resolved) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(MediaError::NotFound(resolved.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound(resolved.to_path_buf()))
            }
            Err(e) => return Err(MediaError::Io(e)),
        }

        let canonical_root = self.root.path().canonicalize()?;
        let canonical = resolved.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            warn!(
                path = %resolved.display(),
                target = %canonical.display(),
                "Rejected symlink escaping trusted root"
            );
            return Err(MediaError::AccessDenied(resolved.to_path_buf()));
        }

        Ok(())
    }
}

fn check_shape(candidate: &str) -> MediaResult<()> {
    if candidate.trim().is_empty() {
        return Err(MediaError::invalid_input("Invalid filePath"));
    }
    if candidate.contains('\0') {
        return Err(MediaError::invalid_input("Path contains null bytes"));
    }
    Ok(())
}

/// Lexically normalize a path: drop `.`, apply `..` (never above the root).
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        parent: PathBuf,
        validator: PathValidator,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let parent = dir.path().to_path_buf();
        let root_path = parent.join("trusted");
        fs::create_dir_all(root_path.join(UPLOADS_DIR)).unwrap();
        fs::write(root_path.join(UPLOADS_DIR).join("video.mp4"), b"fake").unwrap();

        let root = TrustedRoot::new(&root_path, "/").unwrap();
        let validator = PathValidator::new(root, &root_path);
        Fixture {
            _dir: dir,
            parent,
            validator,
        }
    }

    fn root_str(f: &Fixture) -> String {
        f.validator.root().path().display().to_string()
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/../../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize_lexically(Path::new("/a/b/..")), PathBuf::from("/a"));
    }

    #[test]
    fn test_trusted_root_rejects_filesystem_root() {
        assert!(TrustedRoot::new("/", "/").is_err());
        let root = TrustedRoot::new("data", "/srv/app").unwrap();
        assert_eq!(root.path(), Path::new("/srv/app/data"));
    }

    #[test]
    fn test_valid_path_returns_resolved() {
        let f = fixture();
        let raw = format!("{}/uploads/./../uploads/video.mp4", root_str(&f));
        let video = f.validator.validate(&raw).unwrap();
        assert_eq!(video.path(), f.validator.root().path().join("uploads/video.mp4"));
        assert_eq!(video.stem(), "video");
    }

    #[test]
    fn test_relative_path_resolves_against_base_dir() {
        let f = fixture();
        let video = f.validator.validate("uploads/video.mp4").unwrap();
        assert!(video.path().is_absolute());
    }

    #[test]
    fn test_empty_and_nul_are_invalid_input() {
        let f = fixture();
        assert!(matches!(f.validator.validate(""), Err(MediaError::InvalidInput(_))));
        assert!(matches!(f.validator.validate("   "), Err(MediaError::InvalidInput(_))));
        assert!(matches!(
            f.validator.validate("uploads/a\0.mp4"),
            Err(MediaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_traversal_is_access_denied() {
        let f = fixture();
        let raw = format!("{}/../../etc/passwd", root_str(&f));
        assert!(matches!(f.validator.validate(&raw), Err(MediaError::AccessDenied(_))));
        assert!(matches!(
            f.validator.validate("/etc/passwd"),
            Err(MediaError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_sibling_prefix_is_access_denied() {
        let f = fixture();
        let evil = f.parent.join("trusted-evil");
        fs::create_dir_all(&evil).unwrap();
        fs::write(evil.join("x.mp4"), b"fake").unwrap();

        let result = f.validator.validate(&evil.join("x.mp4").display().to_string());
        assert!(matches!(result, Err(MediaError::AccessDenied(_))));
    }

    #[test]
    fn test_root_itself_is_access_denied() {
        let f = fixture();
        let result = f.validator.validate(&root_str(&f));
        assert!(matches!(result, Err(MediaError::AccessDenied(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let f = fixture();
        let raw = format!("{}/uploads/missing.mp4", root_str(&f));
        assert!(matches!(f.validator.validate(&raw), Err(MediaError::NotFound(_))));
        // Directories are not videos
        let raw = format!("{}/uploads", root_str(&f));
        assert!(matches!(f.validator.validate(&raw), Err(MediaError::NotFound(_))));
    }

    #[test]
    fn test_extension_policy() {
        let f = fixture();
        let uploads = f.validator.root().uploads_dir();
        for name in ["clip.mov", "clip.mp4.exe", "clip", "clip.MP3"] {
            fs::write(uploads.join(name), b"fake").unwrap();
            let result = f.validator.validate(&uploads.join(name).display().to_string());
            assert!(
                matches!(result, Err(MediaError::UnsupportedType(_))),
                "{} should be rejected",
                name
            );
        }

        fs::write(uploads.join("VIDEO.MP4"), b"fake").unwrap();
        assert!(f
            .validator
            .validate(&uploads.join("VIDEO.MP4").display().to_string())
            .is_ok());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let f = fixture();
        let raw = format!("{}/uploads/video.mp4", root_str(&f));
        let first = f.validator.validate(&raw).unwrap();
        let second = f.validator.validate(&raw).unwrap();
        assert_eq!(first, second);

        let bad = format!("{}/../outside.mp4", root_str(&f));
        assert!(matches!(f.validator.validate(&bad), Err(MediaError::AccessDenied(_))));
        assert!(matches!(f.validator.validate(&bad), Err(MediaError::AccessDenied(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_access_denied() {
        let f = fixture();
        let outside = f.parent.join("outside.mp4");
        fs::write(&outside, b"secret").unwrap();
        let link = f.validator.root().uploads_dir().join("link.mp4");
        std::os::unix::fs::symlink(&outside, &link).unwrap();

        let result = f.validator.validate(&link.display().to_string());
        assert!(matches!(result, Err(MediaError::AccessDenied(_))));
    }

    #[test]
    fn test_resolve_artifact() {
        let f = fixture();
        let frames = f.validator.root().frames_dir().join("video");
        fs::create_dir_all(&frames).unwrap();
        fs::write(frames.join("frame-00001.png"), b"png").unwrap();

        let resolved = f
            .validator
            .resolve_artifact("frames/video/frame-00001.png")
            .unwrap();
        assert!(resolved.ends_with("frames/video/frame-00001.png"));

        assert!(matches!(
            f.validator.resolve_artifact("../outside.mp4"),
            Err(MediaError::AccessDenied(_))
        ));
        assert!(matches!(
            f.validator.resolve_artifact("/etc/passwd"),
            Err(MediaError::AccessDenied(_))
        ));
        assert!(matches!(
            f.validator.resolve_artifact("trimmed/none.mp4"),
            Err(MediaError::NotFound(_))
        ));
    }
}
