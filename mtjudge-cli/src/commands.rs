//! Subcommand handlers for the mtjudge CLI.

use crate::{Commands, ConfigAction, DatasetArgs, RunArgs};
use mtjudge_core::config::WORKSPACE_CONFIG_FILE;
use mtjudge_core::corpus::CorpusBalance;
use mtjudge_core::corpus::builder::{DatasetSpec, build_dataset};
use mtjudge_core::recorder::RunRecorder;
use mtjudge_core::report::write_markdown_report;
use mtjudge_core::{
    AuditSink, BackendConfig, CorpusLoader, EvalConfig, PromptStore, RunRecord, ScoringLoop,
    create_judge, review,
};
use std::path::Path;

/// Dispatch a parsed subcommand.
pub async fn handle_command(
    command: Commands,
    config: EvalConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Evaluate(args) => handle_evaluate(args, config).await,
        Commands::Infer(args) => handle_infer(args, config).await,
        Commands::Report { path } => handle_report(&path),
        Commands::Dataset(args) => handle_dataset(args, &config),
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut EvalConfig) -> anyhow::Result<()> {
        if let Some(version) = &self.prompt_version {
            config.run.prompt_version = version.clone();
        }
        if let Some(max) = self.max {
            config.run.limit = max;
        }
        if let Some(backend) = &self.backend {
            config.judge.backend = backend.clone();
        }
        if let Some(input) = &self.input {
            config.run.corpus = input.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(model_path) = &self.model_path {
            let name = config.judge.backend.clone();
            match config.judge.backends.get_mut(&name) {
                Some(BackendConfig::Local(local)) => local.model_path = Some(model_path.clone()),
                Some(other) => anyhow::bail!(
                    "--model-path only applies to local backends, '{}' is {}",
                    name,
                    other.kind()
                ),
                None => anyhow::bail!("Unknown judge backend: {}", name),
            }
        }
        Ok(())
    }
}

async fn handle_evaluate(args: RunArgs, mut config: EvalConfig) -> anyhow::Result<()> {
    args.apply(&mut config)?;
    let run = &config.run;

    let prompt = PromptStore::new(&config.prompts).load(&run.prompt_version)?;
    let items = CorpusLoader::new(&config.languages).load(&run.corpus, run.limit())?;
    let balance = CorpusBalance::of(&items);
    println!(
        "Loaded {} items from {} ({:.1}% with errors, {:.1}% correct)",
        balance.total,
        run.corpus.display(),
        balance.error_percent(),
        balance.correct_percent()
    );

    let judge = create_judge(&config.judge, &config.languages).await?;
    let audit_path = config.output.audit_path(&run.prompt_version, run.limit);
    let audit = AuditSink::create(&audit_path, &config.languages)?;

    let scoring = ScoringLoop::new(&judge, &prompt.system_instruction, audit, run.limit());
    let summary = tokio::select! {
        result = scoring.run(&items) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(audit = %audit_path.display(), "Interrupted, no run record written");
            anyhow::bail!("Evaluation interrupted");
        }
    };

    let record = RunRecord::from_summary(
        &summary,
        judge.backend_id(),
        &prompt.version,
        &prompt.description,
    );
    let stats_path = RunRecorder::new(&config.output.dir).append(&record, summary.stats.processed)?;

    println!();
    println!("Prompt:     v{} ({})", prompt.version, prompt.description);
    println!("Backend:    {}", record.backend_id);
    println!(
        "Processed:  {} (tp {}, fp {}, fn {}, tn {}, unparseable {})",
        record.processed_count, record.tp, record.fp, record.fn_, record.tn, record.unparseable
    );
    println!("Precision:  {:.2}", record.precision);
    println!("Recall:     {:.2}", record.recall);
    println!("F1:         {:.2}", record.f1);
    println!("Elapsed:    {:.2}s", record.elapsed_seconds);
    println!("Audit:      {}", audit_path.display());
    println!("Run record: {}", stats_path.display());
    Ok(())
}

async fn handle_infer(args: RunArgs, mut config: EvalConfig) -> anyhow::Result<()> {
    args.apply(&mut config)?;
    let run = &config.run;

    let prompt = PromptStore::new(&config.prompts).load(&run.prompt_version)?;
    let items = CorpusLoader::new(&config.languages).load(&run.corpus, run.limit())?;
    let judge = create_judge(&config.judge, &config.languages).await?;

    let stem = run
        .corpus
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "review".to_string());
    let audit_path = config.output.dir.join(format!("{}.txt", stem));
    let audit = AuditSink::create(&audit_path, &config.languages)?;

    let summary = review(&judge, &prompt.system_instruction, &items, audit).await?;

    println!(
        "Reviewed {} items ({} unparseable answers)",
        summary.items, summary.unparseable
    );
    println!("Audit: {}", audit_path.display());
    println!(
        "Total time used: {:.2} seconds",
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

fn handle_report(path: &Path) -> anyhow::Result<()> {
    let md_path = write_markdown_report(path)?;
    println!("Wrote {}", md_path.display());
    Ok(())
}

fn handle_dataset(args: DatasetArgs, config: &EvalConfig) -> anyhow::Result<()> {
    let spec = DatasetSpec {
        errors: args.errors,
        references: args.references,
        per_reference_limit: args.per_reference_limit,
        cap: args.cap,
        output: args.output,
    };
    let summary = build_dataset(&spec, &config.languages)?;
    println!(
        "Merged {} segments ({} annotated, {} duplicates discarded)",
        summary.total, summary.annotated, summary.discarded
    );
    println!("TMX: {}", summary.tmx_path.display());
    println!("PO:  {}", summary.po_path.display());
    Ok(())
}

fn handle_config(action: ConfigAction, config: &EvalConfig, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = workspace.join(WORKSPACE_CONFIG_FILE);
            if path.exists() {
                println!("Config file already exists: {}", path.display());
                return Ok(());
            }
            let toml_str = toml::to_string_pretty(&EvalConfig::default())?;
            std::fs::write(&path, toml_str)?;
            println!("Created config file: {}", path.display());
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
    }
    Ok(())
}
