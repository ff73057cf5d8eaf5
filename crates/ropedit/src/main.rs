use anyhow::Result;
use log::LevelFilter;
use ropedit::{CommandProcessor, Config, Editor, FileManager};
use std::{env, path::PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with debug fallback for development
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
        logger.filter_module("ropedit", LevelFilter::Debug);
        logger.filter_module("ropecore", LevelFilter::Debug);
    }
    logger.init();

    let config = match Config::load().await {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    };
    let mut editor = Editor::with_config(&config);
    let mut file_manager = FileManager::with_config(&config.files);

    // Load file from command line if provided
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        match file_manager.open_file(PathBuf::from(&args[1])).await {
            Ok(content) => {
                editor.load_bytes(&content)?;
                log::info!("Successfully loaded file from command line: {}", args[1]);
            }
            Err(e) => {
                eprintln!("{}", e);
                log::error!("Failed to load file '{}': {}", args[1], e);
            }
        }
    } else {
        log::info!("No file specified, starting with empty buffer");
    }

    let res = run(&mut editor, &mut file_manager).await;

    if let Err(err) = &res {
        log::error!("Application error: {:#}", err);
    } else if editor.is_modified() {
        log::warn!("Input closed with unsaved changes");
    }
    res
}

/// Reads one command per line from stdin until a quit command or EOF.
async fn run(editor: &mut Editor, file_manager: &mut FileManager) -> Result<()> {
    let processor = CommandProcessor::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut should_quit = false;

    while !should_quit {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match processor
            .execute_command(&line, editor, file_manager, &mut should_quit)
            .await
        {
            Ok(output) => {
                if !output.is_empty() {
                    stdout.write_all(output.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            }
            Err(e) => {
                log::debug!("Command '{}' failed: {:#}", line.trim(), e);
                stdout.write_all(format!("{:#}\n", e).as_bytes()).await?;
            }
        }
        stdout.flush().await?;
    }

    log::info!("Command loop ended");
    Ok(())
}
