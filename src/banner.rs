use std::{
    env,
    io::{self, IsTerminal},
};

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;

/// Full startup banner.
pub const ASCII_FULL: &str = r#"
    pubsub-bridge {version}
    ----------------------------------------------
    Mode:             {mode}
    Listening:        {listen}
    Broker:           {backend} {servers}
    Subscription TTL: {ttl}s
    PID:              {pid}
    OS/Arch:          {os}/{arch}
    Build:            {git} ({build_time})
"#;

/// One-line banner.
pub const ASCII_COMPACT: &str = r#"
pubsub-bridge {version} | {mode} | {listen} | {backend} | PID {pid}
"#;

/// What the banner reports about the running service.
#[derive(Debug, Clone)]
pub struct BannerInfo<'a> {
    pub listen: &'a str,
    pub backend: &'a str,
    pub servers: &'a [String],
    pub ttl_secs: u64,
}

fn mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn build_time() -> String {
    let raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%d.%m.%Y %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Fills the full or compact template.
pub fn render_banner(
    info: &BannerInfo<'_>,
    full: bool,
) -> String {
    let template = if full { ASCII_FULL } else { ASCII_COMPACT };
    let bits = std::mem::size_of::<usize>() * 8;

    template
        .replace(
            "{version}",
            &format!("{} ({bits}-bit)", env!("CARGO_PKG_VERSION")),
        )
        .replace("{mode}", mode())
        .replace("{listen}", info.listen)
        .replace("{backend}", info.backend)
        .replace("{servers}", &info.servers.join(", "))
        .replace("{ttl}", &info.ttl_secs.to_string())
        .replace("{pid}", &std::process::id().to_string())
        .replace("{os}", env::consts::OS)
        .replace("{arch}", env::consts::ARCH)
        .replace("{git}", option_env!("GIT_COMMIT").unwrap_or("unknown"))
        .replace("{build_time}", &build_time())
}

/// Prints the banner. `BRIDGE_BANNER=full|compact` forces a variant;
/// otherwise debug builds get the full one.
pub fn print_banner(info: &BannerInfo<'_>) {
    let full = match env::var("BRIDGE_BANNER").ok().as_deref() {
        Some("full") => true,
        Some("compact") => false,
        _ => cfg!(debug_assertions),
    };
    let banner = render_banner(info, full);

    if !io::stdout().is_terminal() {
        println!("{banner}");
        return;
    }

    if !full {
        println!("{}", banner.bold().green());
        return;
    }
    for (i, line) in banner.lines().enumerate() {
        let trimmed = line.trim_start();
        if i == 1 {
            println!("{}", line.bold().bright_blue());
        } else if trimmed.starts_with("Mode:") || trimmed.starts_with("Broker:") {
            println!("{}", line.cyan());
        } else if trimmed.starts_with("Build:") {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
    println!();
}

/// Two log-style lines marking that the server accepts requests.
pub fn print_startup_log() {
    let pid = std::process::id();
    let ts = Local::now().format("%d %b %Y %H:%M:%S%.3f").to_string();

    if io::stdout().is_terminal() {
        println!(
            "[{}] {} {}",
            pid.to_string().red(),
            ts.white(),
            format!("# Server started, version {}", env!("CARGO_PKG_VERSION")).dimmed()
        );
        println!(
            "[{}] {} {}",
            pid.to_string().red(),
            ts.white(),
            "* Ready to accept requests".green()
        );
    } else {
        println!(
            "[{pid}] {ts} # Server started, version {}",
            env!("CARGO_PKG_VERSION")
        );
        println!("[{pid}] {ts} * Ready to accept requests");
    }
}
