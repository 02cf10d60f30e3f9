use clap::Parser;
use roster_import::config::toml_config::LogFormat;
use roster_import::utils::error::ErrorSeverity;
use roster_import::utils::{logger, validation::Validate};
use roster_import::{
    CliConfig, Collaborators, ImportConfig, ImportEngine, LocalStorage, LogNotifier, SqliteStore,
    StorageArchiver,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入 TOML 配置（檔案不存在時使用預設值）
    let config = if Path::new(&cli.config).exists() {
        match ImportConfig::from_file(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
                eprintln!("💡 Make sure the file is valid TOML format");
                std::process::exit(2);
            }
        }
    } else {
        ImportConfig::default()
    };

    // 初始化日誌
    match config.output.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(),
    }

    tracing::info!("Starting roster-import");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
        tracing::debug!("Import config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(2);
    }

    let mut options = config.import_options();
    if let Some(feed) = &cli.feed {
        options.feed_path = feed.clone();
    }
    options.dry_run = cli.dry_run;

    let store = match SqliteStore::open(&config.store.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("❌ Unable to open database: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(3);
        }
    };

    let storage = LocalStorage::new(config.feed.base_dir.clone());
    let archiver = config.archive.enabled.then(|| {
        Arc::new(StorageArchiver::new(
            storage.clone(),
            config.archive.directory.clone(),
            config.archive.compress,
        )) as Arc<dyn roster_import::core::Archiver>
    });
    let collaborators = Collaborators {
        run_log: store.clone(),
        notifier: Arc::new(LogNotifier::new(config.notification.recipients.clone())),
        archiver,
    };

    let engine = ImportEngine::new(storage, store, collaborators, options)?;
    let report = engine.run().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} ({} records, {} created, {} updated, {} warnings)",
            if report.is_success() { "✅" } else { "❌" },
            report.message,
            report.stats.records,
            report.stats.students_created,
            report.stats.students_updated,
            report.warnings.len()
        );
        for warning in &report.warnings {
            println!("⚠️  {}", warning.message());
        }
        if let Some(location) = &report.archived_to {
            println!("📁 Feed archived to: {}", location);
        }
    }

    if !report.is_success() {
        // 依錯誤嚴重程度決定退出碼
        let exit_code = match report.severity() {
            Some(ErrorSeverity::Critical) => 3,
            Some(ErrorSeverity::Medium) => 2,
            _ => 1,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}
