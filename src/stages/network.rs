//! Wi-Fi readiness
//!
//! Raspberry Pi OS ships with the radio soft-blocked until a regulatory
//! country is set. This stage sets one and unblocks the radio. It is a
//! convenience: every failure is logged and the run continues.

use crate::error::ProvisionResult;
use crate::host::Invocation;
use crate::pipeline::{ErrorPolicy, Outcome, RunState, Stage, StageContext};
use crate::ui::{self, TaskSpinner};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

pub struct WifiReadiness;

#[async_trait]
impl Stage for WifiReadiness {
    fn name(&self) -> &'static str {
        "wifi"
    }

    fn title(&self) -> &'static str {
        "Wi-Fi"
    }

    fn policy(&self) -> ErrorPolicy {
        ErrorPolicy::LoggedAndIgnored
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        _state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        if !ctx.host.command_exists("rfkill").await {
            ui::step_info(ctx.ui, "rfkill not available, skipping Wi-Fi setup");
            return Ok(Outcome::AlreadySatisfied);
        }

        let listing = ctx
            .host
            .run_checked(&Invocation::new("rfkill").args(["list", "wifi"]))
            .await?;
        if !soft_blocked(&listing.stdout) {
            ui::step_ok(ctx.ui, "Wi-Fi not blocked");
            return Ok(Outcome::AlreadySatisfied);
        }

        let network = &ctx.config.network;
        let mut spinner = TaskSpinner::new(ctx.ui);
        spinner.start("Detecting Wi-Fi country...");
        let timeout = Duration::from_secs(network.lookup_timeout_secs);
        let country = match ctx.host.fetch_text(&network.country_lookup_url, timeout).await {
            Ok(body) => match normalize_country(&body) {
                Some(code) => {
                    spinner.stop(&format!("Country detected: {}", code));
                    code
                }
                None => {
                    debug!("Lookup returned {:?}, not a country code", body.trim());
                    spinner.stop_warn(&format!(
                        "Unexpected lookup result, using {}",
                        network.fallback_country
                    ));
                    network.fallback_country.clone()
                }
            },
            Err(e) => {
                warn!("Country lookup failed: {}", e);
                spinner.stop_warn(&format!("Lookup failed, using {}", network.fallback_country));
                network.fallback_country.clone()
            }
        };

        if ctx.host.command_exists("raspi-config").await {
            ctx.host
                .run_checked(&Invocation::new("raspi-config").args([
                    "nonint",
                    "do_wifi_country",
                    country.as_str(),
                ]))
                .await?;
        } else if ctx.host.command_exists("iw").await {
            ctx.host
                .run_checked(&Invocation::new("iw").args(["reg", "set", country.as_str()]))
                .await?;
        } else {
            ui::step_warn(ctx.ui, "Neither raspi-config nor iw found, country not set");
        }

        ctx.host
            .run_checked(&Invocation::new("rfkill").args(["unblock", "wifi"]))
            .await?;
        ui::step_ok_detail(ctx.ui, "Wi-Fi unblocked", &country);

        Ok(Outcome::Created)
    }
}

/// Whether `rfkill list wifi` reports a soft block
pub fn soft_blocked(listing: &str) -> bool {
    listing.lines().any(|line| {
        line.trim()
            .strip_prefix("Soft blocked:")
            .is_some_and(|v| v.trim() == "yes")
    })
}

/// Accept exactly two ASCII letters, returned uppercase
pub fn normalize_country(body: &str) -> Option<String> {
    let code = body.trim();
    (code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::host::CommandOutput;
    use crate::stages::testing::Fixture;

    const BLOCKED: &str = "0: phy0: Wireless LAN\n\tSoft blocked: yes\n\tHard blocked: no\n";
    const UNBLOCKED: &str = "0: phy0: Wireless LAN\n\tSoft blocked: no\n\tHard blocked: no\n";

    fn rfkill_host(listing: &'static str) -> FakeHost {
        FakeHost::new().on(move |_, inv| {
            (inv.program == "rfkill" && inv.args[0] == "list").then(|| CommandOutput::ok(listing))
        })
    }

    #[test]
    fn parses_rfkill() {
        assert!(soft_blocked(BLOCKED));
        assert!(!soft_blocked(UNBLOCKED));
        assert!(!soft_blocked(""));
    }

    #[test]
    fn country_codes() {
        assert_eq!(normalize_country("de\n").as_deref(), Some("DE"));
        assert_eq!(normalize_country(" US ").as_deref(), Some("US"));
        assert_eq!(normalize_country("USA"), None);
        assert_eq!(normalize_country("<html>"), None);
        assert_eq!(normalize_country("1A"), None);
        assert_eq!(normalize_country(""), None);
    }

    #[tokio::test]
    async fn unblocked_radio_is_left_alone() {
        let fixture = Fixture::new();
        let host = rfkill_host(UNBLOCKED).with_commands(&["rfkill", "raspi-config"]);
        let mut state = fixture.state();

        let outcome = fixture.ensure(&WifiReadiness, &host, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::AlreadySatisfied);
        assert_eq!(host.lines(), ["rfkill list wifi"]);
    }

    #[tokio::test]
    async fn blocked_radio_gets_detected_country() {
        let fixture = Fixture::new();
        let host = rfkill_host(BLOCKED)
            .with_commands(&["rfkill", "raspi-config"])
            .with_country("nl\n");
        let mut state = fixture.state();

        let outcome = fixture.ensure(&WifiReadiness, &host, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::Created);
        assert_eq!(
            host.lines(),
            [
                "rfkill list wifi",
                "raspi-config nonint do_wifi_country NL",
                "rfkill unblock wifi",
            ]
        );
    }

    #[tokio::test]
    async fn lookup_failure_uses_fallback() {
        let fixture = Fixture::new();
        let host = rfkill_host(BLOCKED).with_commands(&["rfkill", "iw"]);
        let mut state = fixture.state();

        fixture.ensure(&WifiReadiness, &host, &mut state).await.unwrap();
        assert_eq!(host.lines()[1], "iw reg set GB");
    }

    #[tokio::test]
    async fn missing_rfkill_skips() {
        let fixture = Fixture::new();
        let host = FakeHost::new();
        let mut state = fixture.state();

        let outcome = fixture.ensure(&WifiReadiness, &host, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::AlreadySatisfied);
        assert!(host.calls().is_empty());
    }
}
