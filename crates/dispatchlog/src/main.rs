//! `dlog` - CLI for dispatchlog
//!
//! This binary logs dispatcher instructions and prints the daily and
//! per-driver summaries built from them.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fmt::Display;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use clap::Parser;
use tracing::{debug, info};

use dispatchlog::cli::{
    AddCommand, Cli, Command, ConfigCommand, DeleteCommand, EditCommand, ImportCommand,
    ListCommand, OutputFormat, ReportCommand, StatsCommand,
};
use dispatchlog::config::ReportTimezone;
use dispatchlog::dates::{long_date, parse_date, parse_datetime, today};
use dispatchlog::view::{count_on_date, driver_stats, unique_employees, ViewFilter};
use dispatchlog::wire::{import_into, read_import};
use dispatchlog::{
    init_logging, Config, InstructionRecord, NewInstruction, RecordId, RecordStore, Reporter,
    Storage,
};

/// Longest instruction shown in table listings before it is cut short.
const TABLE_INSTRUCTION_WIDTH: usize = 48;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match config.report.timezone {
        ReportTimezone::Local => App::new(config, Local).run(cli.command),
        ReportTimezone::Utc => App::new(config, Utc).run(cli.command),
    }
}

/// Command handlers, bound to the configured report time zone.
#[derive(Debug)]
struct App<Tz: TimeZone> {
    config: Config,
    tz: Tz,
}

impl<Tz> App<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    fn new(config: Config, tz: Tz) -> Self {
        Self { config, tz }
    }

    fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Add(cmd) => self.handle_add(cmd),
            Command::List(cmd) => self.handle_list(cmd),
            Command::Edit(cmd) => self.handle_edit(&cmd),
            Command::Delete(cmd) => self.handle_delete(&cmd),
            Command::Report(cmd) => self.handle_report(cmd),
            Command::Stats(cmd) => self.handle_stats(&cmd),
            Command::Employees => self.handle_employees(),
            Command::Import(cmd) => self.handle_import(&cmd),
            Command::Status(cmd) => self.handle_status(cmd.json),
            Command::Config(cmd) => self.handle_config(cmd),
        }
    }

    fn storage(&self) -> Result<Storage> {
        let path = self.config.database_path();
        Storage::open(&path).with_context(|| format!("failed to open {}", path.display()))
    }

    fn date_or_today(&self, input: Option<&str>) -> Result<NaiveDate> {
        let today = today(&self.tz);
        Ok(input.map(|d| parse_date(d, today)).transpose()?.unwrap_or(today))
    }

    fn handle_add(&self, cmd: AddCommand) -> Result<()> {
        let mut new = NewInstruction::new(cmd.route, cmd.run, cmd.instruction)?
            .with_employee(cmd.employee)
            .with_headway_deviation(cmd.headway)?
            .with_early_late(cmd.early_late)
            .with_communication_type(cmd.comm.map(Into::into));
        if let Some(at) = &cmd.at {
            new = new.at(parse_datetime(at, &self.tz)?)?;
        }
        new.check_length(self.config.records.max_instruction_length)?;

        let record = self.storage()?.create(&new)?;
        info!(id = %record.id, employee = record.employee_label(), "instruction logged");
        println!("Logged instruction {}", record.id);
        Ok(())
    }

    fn handle_list(&self, cmd: ListCommand) -> Result<()> {
        let filter = ViewFilter {
            search: cmd.search,
            date: cmd
                .date
                .as_deref()
                .map(|d| parse_date(d, today(&self.tz)))
                .transpose()?,
            employee: cmd.employee,
        };

        let records = self.storage()?.list_all()?;
        let matching = filter.apply(&records, &self.tz);
        debug!(total = records.len(), shown = matching.len(), "listing instructions");

        match cmd.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matching)?),
            OutputFormat::Plain => {
                for record in &matching {
                    println!(
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        record.id,
                        record.timestamp.with_timezone(&self.tz).format("%Y-%m-%d %H:%M"),
                        record.employee_label(),
                        record.route,
                        record.running_number,
                        record.instruction
                    );
                }
            }
            OutputFormat::Table => self.print_table(&matching),
        }
        Ok(())
    }

    fn print_table(&self, records: &[&InstructionRecord]) {
        if records.is_empty() {
            println!("No instructions found.");
            return;
        }

        println!(
            "{:>5}  {:<14}  {:<18}  {:<6}  {:<8}  INSTRUCTION",
            "ID", "TIME", "EMPLOYEE", "ROUTE", "RUN"
        );
        for record in records {
            println!(
                "{:>5}  {:<14}  {:<18}  {:<6}  {:<8}  {}",
                record.id.to_string(),
                record.timestamp.with_timezone(&self.tz).format("%b %d, %H:%M").to_string(),
                record.employee_label(),
                record.route,
                record.running_number,
                shorten(&record.instruction, TABLE_INSTRUCTION_WIDTH)
            );
        }
        println!();
        println!("{} instruction(s)", records.len());
    }

    fn handle_edit(&self, cmd: &EditCommand) -> Result<()> {
        let update = cmd.to_update(&self.tz)?;
        let record = self.storage()?.update(RecordId(cmd.id), &update)?;
        info!(id = %record.id, "instruction updated");
        println!(
            "Updated instruction {}: {} at {}",
            record.id,
            record.employee_label(),
            record.timestamp.with_timezone(&self.tz).format("%Y-%m-%d %H:%M")
        );
        Ok(())
    }

    fn handle_delete(&self, cmd: &DeleteCommand) -> Result<()> {
        let id = RecordId(cmd.id);
        if !cmd.execute(&self.storage()?)? {
            println!("This will permanently delete instruction {id}.");
            println!("Use --yes to confirm.");
            return Ok(());
        }
        info!(%id, "instruction deleted");
        println!("Deleted instruction {id}");
        Ok(())
    }

    fn handle_report(&self, cmd: ReportCommand) -> Result<()> {
        let reporter = Reporter::new(self.tz.clone());
        let records = self.storage()?.list_all()?;

        let (text, output) = match cmd {
            ReportCommand::Daily { date, output } => {
                let date = self.date_or_today(date.as_deref())?;
                let summary = reporter.daily(&records, date, Utc::now());
                (summary.to_string(), output)
            }
            ReportCommand::Employee {
                employee,
                date,
                output,
            } => {
                let date = self.date_or_today(date.as_deref())?;
                let summary = reporter.employee_daily(&records, &employee, date, Utc::now())?;
                (summary.to_string(), output)
            }
        };

        match output {
            Some(path) => {
                write_report(&path, &text)?;
                println!("Report written to {}", path.display());
            }
            None => println!("{text}"),
        }
        Ok(())
    }

    fn handle_stats(&self, cmd: &StatsCommand) -> Result<()> {
        let date = self.date_or_today(cmd.date.as_deref())?;
        let records = self.storage()?.list_all()?;
        let on_date = count_on_date(&records, date, &self.tz);
        let drivers = driver_stats(&records, self.config.report.top_drivers);

        if cmd.json {
            let stats = serde_json::json!({
                "total": records.len(),
                "date": date,
                "on_date": on_date,
                "employees": unique_employees(&records).len(),
                "top_drivers": drivers,
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Instruction statistics");
        println!("----------------------");
        println!("Total instructions:  {}", records.len());
        println!("On {}:  {on_date}", long_date(date));
        println!();
        if drivers.is_empty() {
            println!("No instructions logged yet.");
        } else {
            println!("Most-instructed drivers:");
            for (rank, driver) in drivers.iter().enumerate() {
                println!("{:>3}. {:<20} {}", rank + 1, driver.label, driver.count);
            }
        }
        Ok(())
    }

    fn handle_employees(&self) -> Result<()> {
        let records = self.storage()?.list_all()?;
        for employee in unique_employees(&records) {
            println!("{employee}");
        }
        Ok(())
    }

    fn handle_import(&self, cmd: &ImportCommand) -> Result<()> {
        let items = read_import(&cmd.file)
            .with_context(|| format!("failed to read {}", cmd.file.display()))?;
        let imported = import_into(
            &self.storage()?,
            items,
            self.config.records.max_instruction_length,
        )
        .with_context(|| format!("nothing imported from {}", cmd.file.display()))?;

        info!(count = imported, file = %cmd.file.display(), "import complete");
        println!("Imported {imported} instruction(s)");
        Ok(())
    }

    fn handle_status(&self, json: bool) -> Result<()> {
        let storage = self.storage()?;
        let stats = storage.stats()?;

        if json {
            let status = serde_json::json!({
                "database_path": storage.path(),
                "total_records": stats.total_records,
                "oldest_record": stats.oldest_record,
                "newest_record": stats.newest_record,
                "db_size_bytes": stats.db_size_bytes,
                "timezone": self.config.report.timezone,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        let format_time = |t: Option<chrono::DateTime<Utc>>| {
            t.map_or_else(
                || "-".to_string(),
                |t| t.with_timezone(&self.tz).format("%Y-%m-%d %H:%M").to_string(),
            )
        };
        println!("dlog status");
        println!("-----------");
        println!("Database:      {}", storage.path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Instructions:  {}", stats.total_records);
        println!("Oldest:        {}", format_time(stats.oldest_record));
        println!("Newest:        {}", format_time(stats.newest_record));
        Ok(())
    }

    fn handle_config(&self, cmd: ConfigCommand) -> Result<()> {
        let config = &self.config;
        match cmd {
            ConfigCommand::Show { json } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(config)?);
                } else {
                    let max = match config.records.max_instruction_length {
                        0 => "unlimited".to_string(),
                        n => n.to_string(),
                    };
                    println!("Current Configuration");
                    println!("=====================");
                    println!();
                    println!("[Storage]");
                    println!("  Database path:      {}", config.database_path().display());
                    println!();
                    println!("[Report]");
                    println!("  Time zone:          {:?}", config.report.timezone);
                    println!("  Top drivers:        {}", config.report.top_drivers);
                    println!();
                    println!("[Records]");
                    println!("  Max instruction:    {max}");
                }
            }
            ConfigCommand::Path => {
                println!("{}", Config::default_config_path().display());
            }
            ConfigCommand::Validate { file } => {
                let path = file.unwrap_or_else(Config::default_config_path);
                println!("Validating configuration: {}", path.display());
                match Config::load_from(Some(path)) {
                    Ok(_) => println!("Configuration is valid."),
                    Err(e) => bail!("configuration error: {e}"),
                }
            }
        }
        Ok(())
    }
}

fn write_report(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, format!("{text}\n"))
        .with_context(|| format!("failed to write {}", path.display()))
}

fn shorten(text: &str, width: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= width && first_line.len() == text.len() {
        return text.to_string();
    }
    let cut: String = first_line.chars().take(width.saturating_sub(3)).collect();
    format!("{cut}...")
}
