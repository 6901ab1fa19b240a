const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

macro_rules! env_or {
    ($key:literal, $default:literal) => {
        option_env!($key).unwrap_or($default)
    };
}

pub struct BannerInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit_short: &'static str,
    pub profile: &'static str,
}

impl Default for BannerInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: env_or!("GIT_BRANCH", "unknown"),
            commit_short: env_or!("GIT_COMMIT_SHORT", "unknown"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

/// `node` is the audio node name, `None` when music is disabled.
pub fn print_banner(info: &BannerInfo, environment: &str, node: Option<&str>) {
    println!();
    println!("{GREEN}  _                    _           _   {RESET}");
    println!("{GREEN} | |_ _   _ _ __   ___| |__   ___ | |_ {RESET}");
    println!("{GREEN} | __| | | | '_ \\ / _ \\ '_ \\ / _ \\| __|{RESET}");
    println!("{GREEN} | |_| |_| | | | |  __/ |_) | (_) | |_ {RESET}");
    println!("{GREEN}  \\__|\\__,_|_| |_|\\___|_.__/ \\___/ \\__|{RESET}");
    println!("{DIM}========================================{RESET}");
    println!();

    print_row("Version", info.version, CYAN);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", info.commit_short, RESET);
    print_row("Profile", info.profile, YELLOW);
    print_row("Environment", environment, BOLD);
    match node {
        Some(node) => print_row("Audio node", node, GREEN),
        None => print_row("Audio node", "disabled", DIM),
    }
    println!();
}

fn print_row(label: &str, value: &str, color: &str) {
    println!("  {BOLD}{label:<14}{RESET}{color}{value}{RESET}");
}
