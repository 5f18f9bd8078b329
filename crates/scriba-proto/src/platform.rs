use std::path::PathBuf;

pub fn data_dir() -> PathBuf {
    // XDG-style ~/.local/share/scriba on unix for consistency across
    // macOS and Linux; platform-local data dir on Windows.
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("scriba")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriba")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".config")
            .join("scriba")
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriba")
    }
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}
