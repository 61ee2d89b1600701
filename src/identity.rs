//! The non-root account that owns the toolchain and the build

use crate::error::{ProvisionError, ProvisionResult};
use crate::host::{Host, Invocation};
use std::path::PathBuf;
use tracing::debug;

/// Resolved invoking user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl Identity {
    /// `user:group` for chown
    pub fn owner_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }

    /// Per-user opam root
    pub fn opam_root(&self) -> PathBuf {
        self.home.join(".opam")
    }
}

/// Resolve the invoking user.
///
/// An explicit name (from `--user` or `SUDO_USER`) wins; otherwise the login
/// name of the controlling session is used. `root` never qualifies.
pub async fn resolve(host: &dyn Host, explicit: Option<&str>) -> ProvisionResult<Identity> {
    let name = match explicit {
        Some(name) => name.trim().to_string(),
        None => {
            let out = host.run(&Invocation::new("logname")).await?;
            if out.success() {
                out.stdout.trim().to_string()
            } else {
                String::new()
            }
        }
    };

    if name.is_empty() || name == "root" {
        return Err(ProvisionError::IdentityUnresolved);
    }

    let out = host
        .run(&Invocation::new("getent").args(["passwd", name.as_str()]))
        .await?;
    if !out.success() {
        return Err(ProvisionError::IdentityLookup {
            user: name,
            reason: format!("getent exited with code {}", out.code),
        });
    }

    let identity = parse_passwd_line(out.stdout.lines().next().unwrap_or_default()).map_err(
        |reason| ProvisionError::IdentityLookup {
            user: name.clone(),
            reason,
        },
    )?;

    if identity.uid == 0 {
        return Err(ProvisionError::IdentityUnresolved);
    }

    debug!(
        "Resolved identity {} (uid {}, home {})",
        identity.name,
        identity.uid,
        identity.home.display()
    );
    Ok(identity)
}

/// Parse one `name:passwd:uid:gid:gecos:home:shell` record
pub fn parse_passwd_line(line: &str) -> Result<Identity, String> {
    let fields: Vec<&str> = line.trim_end().split(':').collect();
    if fields.len() < 7 {
        return Err(format!("malformed passwd entry '{}'", line.trim_end()));
    }

    let uid = fields[2]
        .parse()
        .map_err(|_| format!("invalid uid '{}'", fields[2]))?;
    let gid = fields[3]
        .parse()
        .map_err(|_| format!("invalid gid '{}'", fields[3]))?;
    if fields[5].is_empty() {
        return Err("empty home directory".to_string());
    }

    Ok(Identity {
        name: fields[0].to_string(),
        uid,
        gid,
        home: PathBuf::from(fields[5]),
    })
}
