use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::base_system::context::safe_fs_name;

pub fn entry_folder_name(entry_name: &str) -> String {
    safe_fs_name(entry_name, "_", 120)
}

/// 确保章节目录存在（幂等；并发创建同一目录时不报错）。
pub fn ensure_entry_dir(root: &Path, entry_name: &str) -> io::Result<PathBuf> {
    let dir = root.join(entry_folder_name(entry_name));
    if !dir.is_dir() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// 页序号补零到 4 位，`ext` 需包含 `.`。
pub fn page_file_name(index: usize, ext: &str) -> String {
    format!("{:04}{}", index, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_file_name_is_zero_padded() {
        assert_eq!(page_file_name(0, ".jpg"), "0000.jpg");
        assert_eq!(page_file_name(81, ".png"), "0081.png");
        assert_eq!(page_file_name(12345, ".png"), "12345.png");
    }

    #[test]
    fn ensure_entry_dir_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let first = ensure_entry_dir(root.path(), "第1话: 开端").unwrap();
        let second = ensure_entry_dir(root.path(), "第1话: 开端").unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert_eq!(first.file_name().unwrap(), "第1话： 开端");
    }
}
