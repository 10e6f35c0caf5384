use std::env;
use std::io;
use std::path::PathBuf;

/// Directory containing the running executable.
pub fn executable_dir() -> io::Result<PathBuf> {
    let exe = env::current_exe()?;
    exe.parent()
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "executable has no parent directory")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_dir_contains_test_binary() {
        let dir = executable_dir().unwrap();
        let exe = env::current_exe().unwrap();
        assert!(exe.starts_with(&dir));
        assert!(dir.is_dir());
    }
}
