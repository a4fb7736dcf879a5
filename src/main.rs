use app_crawler::cli::commands::{CrawlRequest, cmd_crawl, init_logging};
use app_crawler::cli::config::{Cli, Commands, CrawlOverrides, OutputConfig, load_config};
use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Crawl {
            app_id,
            launch_activity,
            server,
            max_depth,
            max_scrolls,
            max_crashes,
            screenshots_dir,
            trace,
            report,
            demo,
        } => {
            let request = CrawlRequest {
                overrides: CrawlOverrides {
                    app_id,
                    launch_activity,
                    max_depth,
                    max_scrolls,
                    max_crashes,
                },
                server,
                output: OutputConfig {
                    screenshots_dir,
                    trace,
                    report,
                },
                demo,
            };

            let completed = cmd_crawl(request, &config)?;
            if !completed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
