//! Fake key tool executables for tests.
//!
//! Small shell scripts standing in for the real generator and encryptor so
//! tests exercise real subprocess plumbing (stdin passphrases, temp files,
//! exit codes) without the external binaries installed.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::agetool::KeyTool;

const FAKE_KEYGEN: &str = r##"#!/bin/sh
echo "# created: 2024-01-01T00:00:00Z"
echo "# public key: age1faketestpublickeyidentifier"
echo "AGE-SECRET-KEY-1FAKETESTPRIVATEMATERIAL"
"##;

// Encrypt: prefix the key material with the passphrase so decrypt can check
// it. Mirrors the real tool's argument shapes and stdin protocol.
const FAKE_AGE: &str = r#"#!/bin/sh
mode="$1"
if [ "$mode" = "-p" ]; then
    read -r p1
    read -r p2
    if [ "$p1" != "$p2" ]; then
        echo "age: error: passphrases didn't match" >&2
        exit 1
    fi
    printf 'FAKEAGE:%s:' "$p1"
    cat "$4"
elif [ "$mode" = "-d" ]; then
    read -r pass
    content=$(cat "$2")
    case "$content" in
        "FAKEAGE:$pass:"*)
            printf '%s' "${content#FAKEAGE:$pass:}"
            ;;
        *)
            echo "age: error: incorrect passphrase" >&2
            exit 1
            ;;
    esac
else
    echo "fake age: unsupported mode $mode" >&2
    exit 2
fi
"#;

const BROKEN_KEYGEN: &str = r#"#!/bin/sh
echo "nothing that looks like key output"
"#;

pub(crate) struct FakeKeyTools {
    dir: TempDir,
}

impl FakeKeyTools {
    /// Write the fake executables into a temp dir.
    pub(crate) fn install() -> Self {
        let dir = TempDir::new().unwrap();
        write_script(&dir.path().join("age-keygen"), FAKE_KEYGEN);
        write_script(&dir.path().join("age"), FAKE_AGE);
        write_script(&dir.path().join("age-keygen-broken"), BROKEN_KEYGEN);
        Self { dir }
    }

    pub(crate) fn keygen_path(&self) -> PathBuf {
        self.dir.path().join("age-keygen")
    }

    pub(crate) fn age_path(&self) -> PathBuf {
        self.dir.path().join("age")
    }

    pub(crate) fn broken_keygen(&self) -> PathBuf {
        self.dir.path().join("age-keygen-broken")
    }

    /// A [`KeyTool`] wired to the fakes.
    pub(crate) fn tool(&self) -> KeyTool {
        KeyTool::with_programs(
            self.keygen_path().to_string_lossy(),
            self.age_path().to_string_lossy(),
        )
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
