use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".leadsync";
pub const DAEMON_SOCKET: &str = "daemon.sock";
pub const DAEMON_LOG: &str = "leadsync.log";

/// `~/.leadsync`: socket and logs live here.
pub fn state_root(home: &Path) -> PathBuf {
    home.join(STATE_DIR)
}

pub fn socket_path(home: &Path) -> PathBuf {
    state_root(home).join(DAEMON_SOCKET)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    state_root(home).join("logs")
}

pub fn log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_LOG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_lives_under_the_state_root() {
        let home = Path::new("/home/ops");
        assert_eq!(state_root(home), PathBuf::from("/home/ops/.leadsync"));
        assert!(socket_path(home).starts_with(state_root(home)));
        assert_eq!(
            log_path(home),
            PathBuf::from("/home/ops/.leadsync/logs/leadsync.log")
        );
    }
}
