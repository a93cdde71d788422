//! Shared helpers for integration tests.
//!
//! Fake shell-script stand-ins for the external key and encryption tools, so
//! the tests exercise real subprocess plumbing without `age` or `sops`
//! installed.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use secretseal_keys::KeyTool;
use secretseal_ops::EncryptionTool;

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

// Encrypting prepends a marker header, decrypting strips it.
const FAKE_SOPS: &str = r#"#!/bin/sh
recips=""
case "$1" in
    --age=*)
        recips="${1#--age=}"
        shift
        ;;
esac

case "$1" in
    -e)
        shift
        inplace=""
        if [ "$1" = "-i" ]; then inplace=1; shift; fi
        file="$1"
        if head -n1 "$file" 2>/dev/null | grep -q '^#ENC'; then
            echo "sops: file already encrypted" >&2
            exit 1
        fi
        out=$(printf '#ENC recipients=%s\n' "$recips"; cat "$file")
        if [ -n "$inplace" ]; then
            printf '%s\n' "$out" > "$file"
        else
            printf '%s\n' "$out"
        fi
        ;;
    -d)
        shift
        if [ "$1" = "-i" ]; then
            file="$2"
            if ! head -n1 "$file" | grep -q '^#ENC'; then
                echo "sops: failed to decrypt" >&2
                exit 1
            fi
            tail -n +2 "$file" > "$file.tmp" && mv "$file.tmp" "$file"
        else
            file="$1"
            if ! head -n1 "$file" | grep -q '^#ENC'; then
                echo "sops: failed to decrypt" >&2
                exit 1
            fi
            tail -n +2 "$file"
        fi
        ;;
    rotate)
        file="$3"
        if ! head -n1 "$file" | grep -q '^#ENC'; then
            echo "sops: failed to decrypt" >&2
            exit 1
        fi
        ;;
    --output-type)
        file="$4"
        if head -n1 "$file" | grep -q '^#ENC'; then
            recips=$(head -n1 "$file" | sed 's/^#ENC recipients=//')
            json='{"encrypted": true'
            for r in $(printf '%s' "$recips" | tr ',' ' '); do
                json="$json, \"recipient\": \"$r\""
            done
            json="$json}"
            printf '%s\n' "$json"
        else
            printf '{"encrypted": false}\n'
        fi
        ;;
    *)
        echo "fake sops: unsupported invocation" >&2
        exit 2
        ;;
esac
"#;

/// Fake external tools installed into a temp dir.
pub struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    pub fn install() -> Self {
        let dir = TempDir::new().unwrap();
        write_script(&dir.path().join("age-keygen"), FAKE_KEYGEN);
        write_script(&dir.path().join("age"), FAKE_AGE);
        write_script(&dir.path().join("sops"), FAKE_SOPS);
        Self { dir }
    }

    pub fn workdir(&self) -> &Path {
        self.dir.path()
    }

    /// A [`KeyTool`] wired to the fake generator and encryptor.
    pub fn key_tool(&self) -> KeyTool {
        KeyTool::with_programs(
            self.dir.path().join("age-keygen").to_string_lossy(),
            self.dir.path().join("age").to_string_lossy(),
        )
    }

    /// An [`EncryptionTool`] wired to the fake sops.
    pub fn encryption_tool(&self) -> EncryptionTool {
        EncryptionTool::with_program(self.dir.path().join("sops").to_string_lossy())
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join("keys.txt")
    }

    pub fn encrypted_key_path(&self) -> PathBuf {
        self.dir.path().join("keys.txt.encrypted")
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
