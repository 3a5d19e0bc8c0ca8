/// Contents of the `debian-binary` member.
pub const DEBIAN_BINARY: &[u8] = b"2.0\n";

pub const DEBIAN_BINARY_MEMBER: &str = "debian-binary";
pub const CONTROL_MEMBER: &str = "control.tar.gz";
pub const DATA_MEMBER: &str = "data.tar.gz";

/// Name of the required file inside the control directory.
pub const CONTROL_FILE: &str = "control";

/// Control files that are installed executable.
pub const MAINTAINER_SCRIPTS: &[&str] = &["preinst", "postinst", "prerm", "postrm", "config"];

pub const DEFAULT_ARCHITECTURE: &str = "all";
pub const DEFAULT_DISTRIBUTION: &str = "stable";
pub const DEFAULT_URGENCY: &str = "low";

/// Prefix for staged files written beside their final destination.
pub const STAGING_PREFIX: &str = ".debforge-";
