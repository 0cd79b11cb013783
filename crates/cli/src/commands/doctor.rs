use relay_agent::llm::{LanguageOracle, OpenAiCompatibleOracle};
use relay_core::config::{AppConfig, LoadOptions, SessionStoreKind};
use relay_db::{connect_with_settings, SessionRepository, SqlSessionRepository};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_oracle_readiness(&config));
            checks.push(check_session_store(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("oracle_readiness"));
            checks.push(skipped("session_store_connectivity"));
        }
    }

    let all_ok = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_ok { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_ok {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn check_oracle_readiness(config: &AppConfig) -> DoctorCheck {
    match OpenAiCompatibleOracle::from_config(&config.llm) {
        Ok(oracle) => DoctorCheck {
            name: "oracle_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "{} client for model `{}` at {}",
                oracle.name(),
                config.llm.model,
                oracle.endpoint()
            ),
        },
        Err(error) => DoctorCheck {
            name: "oracle_readiness",
            status: CheckStatus::Fail,
            details: format!("failed to build oracle client: {error}"),
        },
    }
}

fn check_session_store(config: &AppConfig) -> DoctorCheck {
    if config.session.store == SessionStoreKind::Memory {
        return DoctorCheck {
            name: "session_store_connectivity",
            status: CheckStatus::Skipped,
            details: "in-memory session store needs no connection".to_string(),
        };
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "session_store_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let ping = SqlSessionRepository::new(pool.clone())
            .ping()
            .await
            .map_err(|error| format!("session store ping failed: {error}"));
        pool.close().await;
        ping
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "session_store_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(details) => {
            DoctorCheck { name: "session_store_connectivity", status: CheckStatus::Fail, details }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
