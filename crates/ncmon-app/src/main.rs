//! # ncmon
//!
//! NC Monitoring 점검 바이너리.
//! 설정 로드 → 어댑터 조립(DI) → 실행 1회 → 리포트 출력.
//! `--offline-report`면 점검 대신 장기 오프라인 보고 탭만 갱신한다.
//! 종료 코드: 0 = 완료, 2 = 실행 중단, 1 = 시작 실패 또는 보고 실패.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ncmon_app::coordinator::{RunCoordinator, RunOptions};
use ncmon_app::offline_report::{OfflineReport, OfflineReportOptions};
use ncmon_app::report::{render_json, render_summary};
use ncmon_app::settings::{self, CliOverrides};
use ncmon_core::config::AppConfig;
use ncmon_core::models::report::RunOutcome;
use ncmon_core::ports::text_recognizer::TextRecognizer;
use ncmon_network::anydesk::AnyDeskTransport;
use ncmon_network::fleet_client::HttpFleetClient;
use ncmon_network::ledger_writer::LedgerWriter;
use ncmon_network::prober::ReachabilityProber;
use ncmon_network::sheets_store::SheetsLedgerStore;
use ncmon_vision::classifier::ScreenshotClassifier;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 디지털 사이니지 플레이어 점검 에이전트
///
/// 스크린샷 상태 분류, 오프라인 플레이어 원격 접속 점검, 결과 원장 기록
#[derive(Parser, Debug)]
#[command(name = "ncmon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 (TOML/JSON). 없으면 플랫폼 설정 디렉토리의 ncmon.toml
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 원격 접속 점검 활성화
    #[arg(long, conflicts_with = "no_reachability")]
    reachability: bool,

    /// 원격 접속 점검 비활성화
    #[arg(long)]
    no_reachability: bool,

    /// 이번 실행의 원격 점검 한도
    #[arg(long)]
    probe_quota: Option<u32>,

    /// 동시 작업 수
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// 리포트를 JSON으로 출력
    #[arg(long)]
    json: bool,

    /// 점검 대신 장기 오프라인 보고 탭 갱신
    #[arg(long)]
    offline_report: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_file: self.config.clone(),
            reachability: match (self.reachability, self.no_reachability) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            probe_quota: self.probe_quota,
            workers: self.workers,
        }
    }
}

/// OCR 엔진 선택 (`ocr` feature면 링크된 libtesseract)
#[cfg(feature = "ocr")]
fn text_recognizer(config: &AppConfig) -> Arc<dyn TextRecognizer> {
    Arc::new(ncmon_vision::ocr::LeptessRecognizer::new(&config.classifier.ocr))
}

#[cfg(not(feature = "ocr"))]
fn text_recognizer(config: &AppConfig) -> Arc<dyn TextRecognizer> {
    Arc::new(ncmon_vision::tesseract_cli::TesseractCli::new(
        &config.classifier.ocr,
    ))
}

fn fleet_client(config: &AppConfig) -> Result<Arc<HttpFleetClient>> {
    Ok(Arc::new(
        HttpFleetClient::new(&config.fleet).context("Fleet API 클라이언트 생성 실패")?,
    ))
}

fn sheets_store(config: &AppConfig) -> Result<Arc<SheetsLedgerStore>> {
    Ok(Arc::new(
        SheetsLedgerStore::from_config(&config.ledger, config.request_timeout())
            .context("원장 저장소 생성 실패")?,
    ))
}

/// 어댑터 조립
fn build_coordinator(config: &AppConfig) -> Result<RunCoordinator> {
    let fleet = fleet_client(config)?;

    let classifier = Arc::new(
        ScreenshotClassifier::new(&config.classifier, text_recognizer(config))
            .context("분류기 생성 실패")?,
    );

    let prober = if config.reachability.enabled {
        let transport = Arc::new(AnyDeskTransport::new(&config.reachability));
        Some(Arc::new(ReachabilityProber::new(
            transport,
            config.reachability.probe_timeout(),
        )))
    } else {
        info!("원격 접속 점검 비활성");
        None
    };

    let writer = LedgerWriter::from_config(sheets_store(config)?, &config.ledger);

    Ok(RunCoordinator::new(
        fleet,
        classifier,
        prober,
        writer,
        RunOptions::from_config(config)?,
    ))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let log_filter = format!(
        "ncmon={},ncmon_app={},ncmon_core={},ncmon_vision={},ncmon_network={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let env: HashMap<String, String> = std::env::vars().collect();
    let config = settings::load(&args.overrides(), &env).context("설정 로드 실패")?;
    info!(
        "Fleet API: {}, 원장: {}, 원격 점검: {}",
        config.fleet.base_url,
        config.ledger.spreadsheet_id,
        if config.reachability.enabled { "on" } else { "off" }
    );

    if args.offline_report {
        let report = OfflineReport::new(
            fleet_client(&config)?,
            sheets_store(&config)?,
            OfflineReportOptions::from_config(&config),
        );
        let summary = report.run().await.context("장기 오프라인 보고 실패")?;
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("리포트 직렬화 실패")?
            );
        } else {
            println!(
                "offline report: {} license(s) → '{}' ({} page(s))",
                summary.licenses, summary.tab_title, summary.pages
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let coordinator = build_coordinator(&config)?;
    let report = coordinator.run().await;

    if args.json {
        println!("{}", render_json(&report).context("리포트 직렬화 실패")?);
    } else {
        print!("{}", render_summary(&report));
    }

    match report.outcome() {
        RunOutcome::Completed { device_failures } => {
            if device_failures > 0 {
                warn!("디바이스 {device_failures}건 실패 포함 완료");
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Aborted { .. } => Ok(ExitCode::from(2)),
    }
}
