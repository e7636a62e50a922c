//! The catalogue of platform calls the introspection report runs.
//!
//! Every probe follows the same rules, so they live in one table instead of
//! in the handler. A probe that isn't local-safe either panics or blocks on
//! platform-only infrastructure outside the platform, so it is skipped
//! entirely in local mode rather than attempted.

use hellogae_platform::{appengine, user, Context, PlatformError};
use std::fmt::Display;

/// Written where a value or error is absent.
pub const NIL: &str = "<nil>";

/// A platform call made by a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    /// `user::current`
    UserCurrent,
    /// `user::is_admin`
    UserIsAdmin,
    /// `user::login_url` for `/`
    UserLoginUrl,
    /// `user::logout_url` for `/`
    UserLogoutUrl,
    /// `appengine::app_id`
    AppId,
    /// `appengine::datacenter`
    Datacenter,
    /// `appengine::default_version_hostname`
    DefaultVersionHostname,
    /// `appengine::instance_id`
    InstanceId,
    /// `appengine::is_app_engine`
    IsAppEngine,
    /// `appengine::is_dev_app_server`
    IsDevAppServer,
    /// `appengine::is_flex`
    IsFlex,
    /// `appengine::is_second_gen`
    IsSecondGen,
    /// `appengine::is_standard`
    IsStandard,
    /// `appengine::module_name`
    ModuleName,
    /// `appengine::request_id`
    RequestId,
    /// `appengine::server_software`
    ServerSoftware,
    /// `appengine::service_account`
    ServiceAccount,
    /// `appengine::version_id`
    VersionId,
}

/// The value a probe produced, plus the error if the call has an error
/// channel.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The rendered value.
    pub value: String,
    /// The rendered error, if the call reported one.
    pub error: Option<String>,
}

impl Outcome {
    /// An outcome from a call without an error channel.
    fn value<T: Display>(value: T) -> Self {
        Self {
            value: value.to_string(),
            error: None,
        }
    }

    /// An outcome from a call with an error channel. The error goes in the
    /// report instead of stopping it.
    fn fallible<T: Display>(result: Result<T, PlatformError>) -> Self {
        match result {
            Ok(value) => Self::value(value),
            Err(error) => Self {
                value: String::new(),
                error: Some(error.to_string()),
            },
        }
    }
}

impl Call {
    /// Make the call.
    ///
    /// # Errors
    /// Only for calls without an error channel whose failure leaves nothing
    /// to report. These abort the whole report.
    pub async fn invoke(self, ctx: &Context<'_>) -> Result<Outcome, PlatformError> {
        let platform = ctx.platform();
        let outcome = match self {
            Self::UserCurrent => Outcome::value(
                user::current(ctx).map_or_else(|| NIL.to_string(), |user| user.to_string()),
            ),
            Self::UserIsAdmin => Outcome::value(user::is_admin(ctx)),
            Self::UserLoginUrl => Outcome::fallible(user::login_url(ctx, "/").await),
            Self::UserLogoutUrl => Outcome::fallible(user::logout_url(ctx, "/").await),
            Self::AppId => Outcome::value(appengine::app_id(ctx)),
            Self::Datacenter => Outcome::value(appengine::datacenter(ctx).await),
            Self::DefaultVersionHostname => {
                Outcome::value(appengine::default_version_hostname(ctx))
            }
            Self::InstanceId => Outcome::value(appengine::instance_id(platform).await?),
            Self::IsAppEngine => Outcome::value(appengine::is_app_engine(platform)),
            Self::IsDevAppServer => Outcome::value(appengine::is_dev_app_server(platform)),
            Self::IsFlex => Outcome::value(appengine::is_flex(platform)),
            Self::IsSecondGen => Outcome::value(appengine::is_second_gen(platform)),
            Self::IsStandard => Outcome::value(appengine::is_standard(platform)),
            Self::ModuleName => Outcome::value(appengine::module_name(ctx).await?),
            Self::RequestId => Outcome::value(appengine::request_id(ctx)),
            Self::ServerSoftware => Outcome::value(appengine::server_software(platform)),
            Self::ServiceAccount => Outcome::fallible(appengine::service_account(ctx).await),
            Self::VersionId => Outcome::value(appengine::version_id(ctx).await?),
        };
        Ok(outcome)
    }
}

/// One line of the report.
#[derive(Debug)]
pub struct Probe {
    /// Written before the `=`.
    pub label: &'static str,
    /// What to ask the platform.
    pub call: Call,
    /// Whether the call may run outside the platform.
    pub local_safe: bool,
    /// Whether the line has an `err=` part.
    pub reports_error: bool,
}

impl Probe {
    /// Format a line of the report for `outcome`.
    pub fn render(&self, outcome: &Outcome) -> String {
        if self.reports_error {
            format!(
                "{}={} err={}\n",
                self.label,
                outcome.value,
                outcome.error.as_deref().unwrap_or(NIL)
            )
        } else {
            format!("{}={}\n", self.label, outcome.value)
        }
    }
}

/// A titled section of the report.
#[derive(Debug)]
pub struct ProbeGroup {
    /// Written on its own line, after a blank line.
    pub heading: &'static str,
    /// Run in order.
    pub probes: &'static [Probe],
}

/// Build a table entry.
const fn probe(label: &'static str, call: Call, local_safe: bool, reports_error: bool) -> Probe {
    Probe {
        label,
        call,
        local_safe,
        reports_error,
    }
}

/// End user identity.
const USER_PROBES: &[Probe] = &[
    probe("user.Current(ctx)", Call::UserCurrent, true, false),
    probe("user.IsAdmin(ctx)", Call::UserIsAdmin, true, false),
    probe(r#"user.LoginURL(ctx, "/")"#, Call::UserLoginUrl, false, true),
    probe(r#"user.LogoutURL(ctx, "/")"#, Call::UserLogoutUrl, false, true),
];

/// Application, instance, and request metadata.
const APP_ENGINE_PROBES: &[Probe] = &[
    probe("appengine.AppID(ctx)", Call::AppId, true, false),
    probe("appengine.Datacenter(ctx)", Call::Datacenter, false, false),
    probe(
        "appengine.DefaultVersionHostname(ctx)",
        Call::DefaultVersionHostname,
        false,
        false,
    ),
    probe("appengine.InstanceID()", Call::InstanceId, false, false),
    probe("appengine.IsAppEngine()", Call::IsAppEngine, true, false),
    probe("appengine.IsDevAppServer()", Call::IsDevAppServer, true, false),
    probe("appengine.IsFlex()", Call::IsFlex, true, false),
    probe("appengine.IsSecondGen()", Call::IsSecondGen, true, false),
    probe("appengine.IsStandard()", Call::IsStandard, true, false),
    probe("appengine.ModuleName(ctx)", Call::ModuleName, false, false),
    probe("appengine.RequestID(ctx)", Call::RequestId, true, false),
    probe("appengine.ServerSoftware()", Call::ServerSoftware, true, false),
    probe("appengine.ServiceAccount(ctx)", Call::ServiceAccount, false, true),
    probe("appengine.VersionID(ctx)", Call::VersionId, false, false),
];

/// Every probe, in report order.
pub const CATALOGUE: &[ProbeGroup] = &[
    ProbeGroup {
        heading: "User APIs:",
        probes: USER_PROBES,
    },
    ProbeGroup {
        heading: "App Engine APIs:",
        probes: APP_ENGINE_PROBES,
    },
];

/// Every probe label, in report order.
pub fn labels() -> impl Iterator<Item = &'static str> {
    CATALOGUE
        .iter()
        .flat_map(|group| group.probes.iter())
        .map(|probe| probe.label)
}

#[cfg(test)]
mod tests {
    use super::{labels, probe, Call, Outcome, CATALOGUE};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalogue_order() {
        let expected = vec![
            "user.Current(ctx)",
            "user.IsAdmin(ctx)",
            r#"user.LoginURL(ctx, "/")"#,
            r#"user.LogoutURL(ctx, "/")"#,
            "appengine.AppID(ctx)",
            "appengine.Datacenter(ctx)",
            "appengine.DefaultVersionHostname(ctx)",
            "appengine.InstanceID()",
            "appengine.IsAppEngine()",
            "appengine.IsDevAppServer()",
            "appengine.IsFlex()",
            "appengine.IsSecondGen()",
            "appengine.IsStandard()",
            "appengine.ModuleName(ctx)",
            "appengine.RequestID(ctx)",
            "appengine.ServerSoftware()",
            "appengine.ServiceAccount(ctx)",
            "appengine.VersionID(ctx)",
        ];
        assert_eq!(labels().collect::<Vec<_>>(), expected);
        assert_eq!(
            CATALOGUE.iter().map(|group| group.heading).collect::<Vec<_>>(),
            vec!["User APIs:", "App Engine APIs:"]
        );
    }

    #[test]
    fn test_local_safe_probes() {
        let local_safe: Vec<_> = CATALOGUE
            .iter()
            .flat_map(|group| group.probes.iter())
            .filter(|probe| probe.local_safe)
            .map(|probe| probe.label)
            .collect();
        assert_eq!(
            local_safe,
            vec![
                "user.Current(ctx)",
                "user.IsAdmin(ctx)",
                "appengine.AppID(ctx)",
                "appengine.IsAppEngine()",
                "appengine.IsDevAppServer()",
                "appengine.IsFlex()",
                "appengine.IsSecondGen()",
                "appengine.IsStandard()",
                "appengine.RequestID(ctx)",
                "appengine.ServerSoftware()",
            ]
        );
    }

    #[test]
    fn test_error_channel_probes() {
        let with_errors: Vec<_> = CATALOGUE
            .iter()
            .flat_map(|group| group.probes.iter())
            .filter(|probe| probe.reports_error)
            .map(|probe| probe.call)
            .collect();
        assert_eq!(
            with_errors,
            vec![Call::UserLoginUrl, Call::UserLogoutUrl, Call::ServiceAccount]
        );
    }

    #[test]
    fn test_render() {
        let plain = probe("appengine.IsFlex()", Call::IsFlex, true, false);
        assert_eq!(
            plain.render(&Outcome::value(false)),
            "appengine.IsFlex()=false\n"
        );

        let fallible = probe("appengine.ServiceAccount(ctx)", Call::ServiceAccount, false, true);
        assert_eq!(
            fallible.render(&Outcome::value("hellogov2@appspot.gserviceaccount.com")),
            "appengine.ServiceAccount(ctx)=hellogov2@appspot.gserviceaccount.com err=<nil>\n"
        );
        assert_eq!(
            fallible.render(&Outcome {
                value: String::new(),
                error: Some("API error 2 (user: NOT_ALLOWED)".to_string()),
            }),
            "appengine.ServiceAccount(ctx)= err=API error 2 (user: NOT_ALLOWED)\n"
        );
    }
}
