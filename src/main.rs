use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabled::settings::object::Cell;
use tabled::settings::{Alignment, Span, Style};
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

use tuition::admission::{admit, quote, AdmissionRequest, Quote};
use tuition::billing::DiscountRequest;
use tuition::config::{config_dir, load_config, open_store, Config, CONFIG_TEMPLATE};
use tuition::error::{Result, TuitionError};
use tuition::money::Money;
use tuition::store::{
    CourseFeeId, CourseFeePatch, CourseId, CoursePatch, GeneralFeeId, GeneralFeePatch,
    JsonFileBackend, NewCourse, NewCourseFee, NewGeneralFee, RecordStore, Student, StudentId,
};
use tuition::validation;

#[derive(Parser)]
#[command(name = "tuition")]
#[command(version, about = "Tuition billing and installment planning", long_about = None)]
struct Cli {
    /// Path to config directory (default: ~/.tuition or XDG config)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config.toml
    Init,

    /// Show configuration and record counts
    Status,

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },

    /// Manage general (extra) fees
    Fee {
        #[command(subcommand)]
        action: FeeAction,
    },

    /// Manage per-course fee records
    CourseFee {
        #[command(subcommand)]
        action: CourseFeeAction,
    },

    /// Show the fee breakdown and installment plan for an admission without saving
    Quote {
        #[command(flatten)]
        admission: AdmissionArgs,

        /// Print the quote as JSON
        #[arg(long)]
        json: bool,
    },

    /// Admit a student and store the resulting fees and plan
    Admit {
        /// Student name
        #[arg(short, long)]
        name: String,

        /// Contact phone number
        #[arg(long)]
        phone: Option<String>,

        /// Guardian name
        #[arg(long)]
        guardian: Option<String>,

        /// Status label stored with the student (default: active)
        #[arg(long)]
        status: Option<String>,

        #[command(flatten)]
        admission: AdmissionArgs,
    },

    /// List admitted students
    Students {
        /// Number of students to show (default: all)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a student's fee breakdown and installment plan
    Plan {
        /// Student id or index from 'students' (e.g., 1 or student_1767225600000)
        student: String,
    },

    /// Record a payment for a student
    Pay {
        /// Student id or index from 'students'
        student: String,

        /// Payment amount
        amount: Money,
    },

    /// Show revenue and collection totals
    Stats,

    /// Check for course fee records whose course no longer exists
    Validate {
        /// Delete the orphaned course fee records that were found
        #[arg(long)]
        prune: bool,
    },

    /// Export every record to a JSON snapshot
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace every record with the contents of a JSON snapshot
    Import {
        /// Snapshot file produced by 'export'
        file: PathBuf,

        /// Confirm that all existing records will be replaced
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CourseAction {
    /// Add a course
    Add {
        #[arg(short, long)]
        title: String,

        /// Monthly rate
        #[arg(short, long)]
        rate: Money,

        /// Duration in months
        #[arg(short, long)]
        months: i32,

        /// Create the course with admission closed
        #[arg(long)]
        closed: bool,
    },

    /// List courses
    List,

    /// Update a course
    Update {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        rate: Option<Money>,

        #[arg(short, long)]
        months: Option<i32>,

        /// Open admission
        #[arg(long, conflicts_with = "close")]
        open: bool,

        /// Close admission
        #[arg(long)]
        close: bool,
    },

    /// Delete a course (its fee record is kept; see 'validate')
    Delete { id: String },
}

#[derive(Subcommand)]
enum FeeAction {
    /// Add a general fee
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        amount: Money,
    },

    /// List general fees
    List,

    /// Update a general fee
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        amount: Option<Money>,
    },

    /// Delete a general fee
    Delete { id: String },
}

#[derive(Subcommand)]
enum CourseFeeAction {
    /// Add the fee record for a course (one per course)
    Add {
        /// Course id
        #[arg(short, long)]
        course: String,

        /// Effective monthly rate
        #[arg(short, long)]
        rate: Money,

        #[arg(short, long, default_value = "Tuition")]
        name: String,
    },

    /// List course fee records
    List,

    /// Update a course fee record
    Update {
        id: String,

        #[arg(short, long)]
        rate: Option<Money>,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a course fee record
    Delete { id: String },
}

#[derive(Args)]
struct AdmissionArgs {
    /// Course id
    #[arg(short, long)]
    course: String,

    /// Extra fee id (can be repeated)
    #[arg(short, long = "extra", value_name = "FEE_ID")]
    extras: Vec<String>,

    /// Discount as an amount (e.g., 2000) or percentage (e.g., 10%)
    #[arg(short, long)]
    discount: Option<DiscountRequest>,

    /// Amount paid at admission
    #[arg(short, long, default_value = "0")]
    paid: Money,

    /// Pay the course portion in N monthly installments (2-12)
    #[arg(short, long, value_name = "N", num_args = 0..=1, default_missing_value = "0")]
    installments: Option<u32>,

    /// Admission date (default: today)
    #[arg(long)]
    date: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tuition={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    // Determine config directory
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir),
        Commands::Course { action } => cmd_course(&cfg_dir, action),
        Commands::Fee { action } => cmd_fee(&cfg_dir, action),
        Commands::CourseFee { action } => cmd_course_fee(&cfg_dir, action),
        Commands::Quote { admission, json } => cmd_quote(&cfg_dir, admission, json),
        Commands::Admit {
            name,
            phone,
            guardian,
            status,
            admission,
        } => cmd_admit(&cfg_dir, name, phone, guardian, status, admission),
        Commands::Students { limit } => cmd_students(&cfg_dir, limit),
        Commands::Plan { student } => cmd_plan(&cfg_dir, &student),
        Commands::Pay { student, amount } => cmd_pay(&cfg_dir, &student, amount),
        Commands::Stats => cmd_stats(&cfg_dir),
        Commands::Validate { prune } => cmd_validate(&cfg_dir, prune),
        Commands::Export { output } => cmd_export(&cfg_dir, output),
        Commands::Import { file, force } => cmd_import(&cfg_dir, &file, force),
    }
}

fn open(cfg_dir: &Path) -> Result<(Config, RecordStore<JsonFileBackend>)> {
    let config = load_config(cfg_dir)?;
    let store = open_store(cfg_dir, &config)?;
    Ok((config, store))
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(TuitionError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::create_dir_all(cfg_dir.join("data"))?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;

    println!("Initialized tuition config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit your institute details: $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!("  2. Add a course:                tuition course add --title <title> --rate <monthly> --months <n>");
    println!("  3. Add extra fees:              tuition fee add --name <name> --amount <amount>");
    println!();
    println!("Then admit your first student:");
    println!("  tuition admit --name <name> --course <course-id> --installments 3");

    Ok(())
}

// Table row structs for tabled
#[derive(Tabled)]
struct CourseRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TITLE")]
    title: String,
    #[tabled(rename = "RATE")]
    rate: String,
    #[tabled(rename = "MONTHS")]
    months: i32,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "ADMISSION")]
    admission: String,
}

#[derive(Tabled)]
struct FeeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
}

#[derive(Tabled)]
struct CourseFeeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "COURSE")]
    course: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "RATE")]
    rate: String,
}

#[derive(Tabled)]
struct StudentRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "DUE")]
    due: String,
    #[tabled(rename = "COURSE")]
    course: String,
}

#[derive(Tabled)]
struct InstallmentRow {
    #[tabled(rename = "#")]
    index: u32,
    #[tabled(rename = "MONTH")]
    month: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
}

#[derive(Tabled)]
struct BreakdownRow {
    #[tabled(rename = "ITEM")]
    label: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
}

fn format_whole_money(value: Money, currency_symbol: &str) -> String {
    let grouped = format_grouped_int(value.whole_units());
    format!("{}{:>6}", currency_symbol, grouped)
}

fn format_grouped_int(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut grouped: String = out.chars().rev().collect();
    if negative {
        grouped.insert(0, '-');
    }
    grouped
}

/// Money with two decimals and thousands separators, e.g. "$9,000.00"
fn format_money(value: Money, currency_symbol: &str) -> String {
    let sign = if value.is_negative() { "-" } else { "" };
    let abs = value.minor().unsigned_abs();
    format!(
        "{}{}{}.{:02}",
        sign,
        currency_symbol,
        format_grouped_int((abs / 100) as i64),
        abs % 100
    )
}

/// Student rows followed by TOTAL / (-) PAID / (=) DUE lines. Each footer
/// label spans the #, ID and NAME columns so the amount sits under TOTAL.
fn students_table(rows: Vec<StudentRow>, footer: [(&str, String); 3]) -> Table {
    let first_footer_row = rows.len() + 1;
    let mut builder = Table::builder(rows);
    for (label, amount) in &footer {
        builder.push_record([label.to_string(), String::new(), String::new(), amount.clone()]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    for row in first_footer_row..first_footer_row + footer.len() {
        table
            .modify(Cell::new(row, 0), Span::column(3))
            .modify(Cell::new(row, 0), Alignment::right())
            .modify(Cell::new(row, 4), Span::column(2));
    }
    table
}

/// Show configuration and record counts
fn cmd_status(cfg_dir: &Path) -> Result<()> {
    let (config, store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;

    println!("Tuition Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("Data directory:   {}", store.backend().dir().display());
    println!("Institute:        {}", config.institute.name);
    println!("Courses:          {}", store.courses().len());
    println!("Fees:             {}", store.general_fees().len());
    println!("Course fees:      {}", store.course_fees().len());
    println!("Students:         {}", store.students().len());
    println!(
        "Billing cutoff:   day {} (surplus on {:?} installment)",
        config.billing.schedule.cutoff_day, config.billing.schedule.surplus
    );

    if !store.students().is_empty() {
        println!();
        println!("Recent admissions:");
        for student in store.students().iter().rev().take(5) {
            println!(
                "  {} - {} - {}",
                student.id,
                student.name,
                format_money(student.fee.grand_total, symbol)
            );
        }
    }

    Ok(())
}

fn cmd_course(cfg_dir: &Path, action: CourseAction) -> Result<()> {
    let (config, mut store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;

    match action {
        CourseAction::Add {
            title,
            rate,
            months,
            closed,
        } => {
            let course = store.add_course(NewCourse {
                title,
                monthly_rate: rate,
                duration_months: months,
                admission_open: !closed,
            })?;
            println!("Added course {}", course.id);
            println!("  Title: {}", course.title);
            println!(
                "  Total: {} ({} x {} months)",
                format_money(
                    course.monthly_rate.saturating_mul(i64::from(course.duration_months)),
                    symbol
                ),
                format_money(course.monthly_rate, symbol),
                course.duration_months
            );
        }
        CourseAction::List => {
            if store.courses().is_empty() {
                println!("No courses configured.");
                println!("Add one with: tuition course add --title <title> --rate <monthly> --months <n>");
                return Ok(());
            }

            let rows: Vec<CourseRow> = store
                .courses()
                .iter()
                .map(|c| CourseRow {
                    id: c.id.to_string(),
                    title: c.title.clone(),
                    rate: format_money(c.monthly_rate, symbol),
                    months: c.duration_months,
                    total: format_money(
                        c.monthly_rate.saturating_mul(i64::from(c.duration_months)),
                        symbol,
                    ),
                    admission: if c.admission_open { "OPEN" } else { "CLOSED" }.to_string(),
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
        CourseAction::Update {
            id,
            title,
            rate,
            months,
            open,
            close,
        } => {
            let admission_open = match (open, close) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let patch = CoursePatch {
                title,
                monthly_rate: rate,
                duration_months: months,
                admission_open,
            };
            if !store.update_course(&CourseId::new(&id), patch)? {
                return Err(TuitionError::CourseNotFound(id));
            }
            println!("Updated course {id}");
        }
        CourseAction::Delete { id } => {
            let course_id = CourseId::new(&id);
            let has_fee = store.course_fee_for(&course_id).is_some();
            if !store.delete_course(&course_id)? {
                return Err(TuitionError::CourseNotFound(id));
            }
            println!("Deleted course {id}");
            if has_fee {
                println!("  Its course fee record was kept. Run 'tuition validate --prune' to remove it.");
            }
        }
    }

    Ok(())
}

fn cmd_fee(cfg_dir: &Path, action: FeeAction) -> Result<()> {
    let (config, mut store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;

    match action {
        FeeAction::Add { name, amount } => {
            let fee = store.add_general_fee(NewGeneralFee {
                fee_name: name,
                amount,
            })?;
            println!(
                "Added fee {} ({} {})",
                fee.id,
                fee.fee_name,
                format_money(fee.amount, symbol)
            );
        }
        FeeAction::List => {
            if store.general_fees().is_empty() {
                println!("No fees configured.");
                return Ok(());
            }

            let rows: Vec<FeeRow> = store
                .general_fees()
                .iter()
                .map(|f| FeeRow {
                    id: f.id.to_string(),
                    name: f.fee_name.clone(),
                    amount: format_money(f.amount, symbol),
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
        FeeAction::Update { id, name, amount } => {
            let patch = GeneralFeePatch {
                fee_name: name,
                amount,
            };
            if !store.update_general_fee(&GeneralFeeId::new(&id), patch)? {
                return Err(TuitionError::GeneralFeeNotFound(id));
            }
            println!("Updated fee {id}");
        }
        FeeAction::Delete { id } => {
            if !store.delete_general_fee(&GeneralFeeId::new(&id))? {
                return Err(TuitionError::GeneralFeeNotFound(id));
            }
            println!("Deleted fee {id}");
        }
    }

    Ok(())
}

fn cmd_course_fee(cfg_dir: &Path, action: CourseFeeAction) -> Result<()> {
    let (config, mut store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;

    match action {
        CourseFeeAction::Add { course, rate, name } => {
            let course_id = CourseId::new(&course);
            if store.course(&course_id).is_none() {
                return Err(TuitionError::CourseNotFound(course));
            }
            let fee = store
                .add_course_fee(NewCourseFee {
                    course_id,
                    monthly_rate: rate,
                    fee_name: name,
                })?
                .ok_or(TuitionError::DuplicateCourseFee(course))?;
            println!(
                "Added course fee {} for {} ({} / month)",
                fee.id,
                fee.course_id,
                format_money(fee.monthly_rate, symbol)
            );
        }
        CourseFeeAction::List => {
            if store.course_fees().is_empty() {
                println!("No course fees configured.");
                return Ok(());
            }

            let rows: Vec<CourseFeeRow> = store
                .course_fees()
                .iter()
                .map(|f| CourseFeeRow {
                    id: f.id.to_string(),
                    course: match store.course(&f.course_id) {
                        Some(c) => format!("{} ({})", c.title, c.id),
                        None => format!("{} (missing)", f.course_id),
                    },
                    name: f.fee_name.clone(),
                    rate: format_money(f.monthly_rate, symbol),
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
        CourseFeeAction::Update { id, rate, name } => {
            let patch = CourseFeePatch {
                monthly_rate: rate,
                fee_name: name,
            };
            if !store.update_course_fee(&CourseFeeId::new(&id), patch)? {
                return Err(TuitionError::CourseFeeNotFound(id));
            }
            println!("Updated course fee {id}");
        }
        CourseFeeAction::Delete { id } => {
            if !store.delete_course_fee(&CourseFeeId::new(&id))? {
                return Err(TuitionError::CourseFeeNotFound(id));
            }
            println!("Deleted course fee {id}");
        }
    }

    Ok(())
}

fn parse_date(value: Option<&str>) -> Result<chrono::NaiveDate> {
    match value {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| TuitionError::InvalidDate(s.to_string())),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn admission_request(
    config: &Config,
    args: AdmissionArgs,
    name: String,
    phone: Option<String>,
    guardian_name: Option<String>,
    status: Option<String>,
) -> Result<AdmissionRequest> {
    let admission_date = parse_date(args.date.as_deref())?;
    let installments = args.installments.map(|n| match n {
        0 => config.billing.default_installments,
        n => n,
    });

    Ok(AdmissionRequest {
        name,
        phone,
        guardian_name,
        course_id: CourseId::new(args.course),
        extra_fee_ids: args.extras.into_iter().map(GeneralFeeId::new).collect(),
        discount: args.discount,
        amount_paid: args.paid,
        installments,
        admission_date,
        status,
    })
}

fn print_breakdown(quote: &Quote, symbol: &str) {
    let b = &quote.breakdown;
    let mut rows = vec![BreakdownRow {
        label: format!(
            "{} ({} x {} months)",
            quote.course.title,
            format_money(quote.course.monthly_rate, symbol),
            quote.course.duration_months
        ),
        amount: format_money(b.course_total, symbol),
    }];
    rows.extend(quote.extras.iter().map(|e| BreakdownRow {
        label: e.fee_name.clone(),
        amount: format_money(e.amount, symbol),
    }));
    rows.push(BreakdownRow {
        label: "(-) Discount".to_string(),
        amount: format_money(b.discount_amount, symbol),
    });
    rows.push(BreakdownRow {
        label: "(=) Grand total".to_string(),
        amount: format_money(b.grand_total, symbol),
    });
    rows.push(BreakdownRow {
        label: "(-) Paid".to_string(),
        amount: format_money(b.amount_paid, symbol),
    });
    rows.push(BreakdownRow {
        label: "(=) Due".to_string(),
        amount: format_money(b.amount_due, symbol),
    });

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    print_plan(&quote.plan, symbol);
}

fn print_plan(plan: &tuition::billing::PaymentPlan, symbol: &str) {
    if plan.is_empty() {
        return;
    }
    println!();
    println!("Installment plan (course fee only; extra fees are due up front):");
    let rows: Vec<InstallmentRow> = plan
        .iter()
        .map(|i| InstallmentRow {
            index: i.index,
            month: i.label(),
            amount: format_money(i.amount, symbol),
        })
        .collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
}

/// Show a quote without storing anything
fn cmd_quote(cfg_dir: &Path, args: AdmissionArgs, json: bool) -> Result<()> {
    let (config, store) = open(cfg_dir)?;
    let request = admission_request(&config, args, String::new(), None, None, None)?;
    let quote = quote(&store, &config.billing.schedule, &request)?;

    if json {
        let out = serde_json::to_string_pretty(&quote).map_err(|source| TuitionError::Json {
            key: "quote".to_string(),
            source,
        })?;
        println!("{out}");
        return Ok(());
    }

    print_breakdown(&quote, &config.institute.currency_symbol);
    Ok(())
}

/// Admit a student
fn cmd_admit(
    cfg_dir: &Path,
    name: String,
    phone: Option<String>,
    guardian: Option<String>,
    status: Option<String>,
    args: AdmissionArgs,
) -> Result<()> {
    let (config, mut store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;
    let request = admission_request(&config, args, name, phone, guardian, status)?;
    let student = admit(&mut store, &config.billing.schedule, request)?;

    println!("Admitted {} ({})", student.name, student.id);
    println!("  Total:  {}", format_money(student.fee.grand_total, symbol));
    println!("  Paid:   {}", format_money(student.fee.amount_paid, symbol));
    println!("  Due:    {}", format_money(student.fee.amount_due, symbol));
    if !student.plan.is_empty() {
        let first = &student.plan.installments[0];
        println!(
            "  Plan:   {} installments from {}",
            student.plan.len(),
            first.label()
        );
    }

    Ok(())
}

/// Resolve a student reference to an id.
/// Accepts either an index (1-based, newest first) from 'students' or the id.
fn resolve_student_id(
    store: &RecordStore<JsonFileBackend>,
    reference: &str,
) -> Result<StudentId> {
    if let Ok(idx) = reference.parse::<usize>() {
        let students: Vec<&Student> = store.students().iter().rev().collect();
        if idx == 0 || idx > students.len() {
            return Err(TuitionError::StudentNotFound(reference.to_string()));
        }
        return Ok(students[idx - 1].id.clone());
    }

    let id = StudentId::new(reference);
    if store.student(&id).is_some() {
        Ok(id)
    } else {
        Err(TuitionError::StudentNotFound(reference.to_string()))
    }
}

/// List admitted students, newest first
fn cmd_students(cfg_dir: &Path, limit: Option<usize>) -> Result<()> {
    let (config, store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;

    if store.students().is_empty() {
        println!("No students admitted yet.");
        return Ok(());
    }

    let students: Vec<_> = store.students().iter().rev().enumerate().collect();
    let students = match limit {
        Some(n) => &students[..n.min(students.len())],
        None => &students[..],
    };

    let rows: Vec<StudentRow> = students
        .iter()
        .map(|(idx, s)| StudentRow {
            index: idx + 1,
            id: s.id.to_string(),
            name: s.name.clone(),
            total: format_whole_money(s.fee.grand_total, symbol),
            due: format_whole_money(s.fee.amount_due, symbol),
            course: store
                .course(&s.course_id)
                .map(|c| c.title.clone())
                .unwrap_or_else(|| s.course_id.to_string()),
        })
        .collect();

    let shown_total: Money = students.iter().map(|(_, s)| s.fee.grand_total).sum();
    let shown_paid: Money = students.iter().map(|(_, s)| s.fee.amount_paid).sum();
    let shown_due: Money = students.iter().map(|(_, s)| s.fee.amount_due).sum();

    let table = students_table(
        rows,
        [
            ("TOTAL", format_whole_money(shown_total, symbol)),
            ("(-) PAID", format_whole_money(shown_paid, symbol)),
            ("(=) DUE", format_whole_money(shown_due, symbol)),
        ],
    );
    println!("{table}");

    println!();
    println!("Total: {} students", store.students().len());
    println!("Use index number with plan/pay (e.g., 'tuition plan 1')");

    Ok(())
}

/// Show the stored breakdown and plan for a student
fn cmd_plan(cfg_dir: &Path, reference: &str) -> Result<()> {
    let (config, store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;
    let id = resolve_student_id(&store, reference)?;
    let student = store
        .student(&id)
        .ok_or_else(|| TuitionError::StudentNotFound(id.to_string()))?;

    println!("{} ({})", student.name, student.id);
    println!("  Course:    {}", student.course_id);
    println!("  Admitted:  {}", student.admission_date);
    println!("  Mode:      {}", student.payment_mode);
    println!("  Status:    {}", student.status);
    println!();
    println!("  Course fee:  {}", format_money(student.fee.course_total, symbol));
    println!("  Extras:      {}", format_money(student.fee.extras_total, symbol));
    println!("  Discount:    {}", format_money(student.fee.discount_amount, symbol));
    println!("  Grand total: {}", format_money(student.fee.grand_total, symbol));
    println!("  Paid:        {}", format_money(student.fee.amount_paid, symbol));
    println!("  Due:         {}", format_money(student.fee.amount_due, symbol));

    print_plan(&student.plan, symbol);
    Ok(())
}

/// Record a payment against a student's balance
fn cmd_pay(cfg_dir: &Path, reference: &str, amount: Money) -> Result<()> {
    let (config, mut store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;

    validation::positive_payment(amount)?;
    let id = resolve_student_id(&store, reference)?;
    let due = store
        .student(&id)
        .map(|s| s.fee.amount_due)
        .ok_or_else(|| TuitionError::StudentNotFound(id.to_string()))?;

    // Guard against overpayment
    if amount > due {
        return Err(TuitionError::OverPayment {
            student: id.to_string(),
            max: due,
        });
    }

    let student = store
        .record_payment(&id, amount)?
        .ok_or_else(|| TuitionError::StudentNotFound(id.to_string()))?;

    if student.fee.amount_due.is_positive() {
        println!(
            "Recorded {} payment for {} ({} remaining)",
            format_money(amount, symbol),
            student.name,
            format_money(student.fee.amount_due, symbol)
        );
    } else {
        println!(
            "Recorded {} payment for {} (fully paid)",
            format_money(amount, symbol),
            student.name
        );
    }

    Ok(())
}

fn cmd_stats(cfg_dir: &Path) -> Result<()> {
    let (config, store) = open(cfg_dir)?;
    let symbol = &config.institute.currency_symbol;
    let stats = store.get_stats();

    println!("Courses:         {}", stats.course_count);
    println!("Fees:            {}", stats.general_fee_count);
    println!("Course fees:     {}", stats.course_fee_count);
    println!("Students:        {}", stats.student_count);
    println!("Total revenue:   {}", format_money(stats.total_revenue, symbol));
    println!("Total paid:      {}", format_money(stats.total_paid, symbol));
    println!("Total due:       {}", format_money(stats.total_due, symbol));
    println!("Collection rate: {:.1}%", stats.collection_rate_percent);

    Ok(())
}

/// Report orphaned course fees and optionally remove them
fn cmd_validate(cfg_dir: &Path, prune: bool) -> Result<()> {
    let (config, mut store) = open(cfg_dir)?;
    let report = store.validate_data();

    if report.is_valid {
        println!("All course fee records reference existing courses.");
        return Ok(());
    }

    println!(
        "Found {} orphaned course fee record(s):",
        report.orphaned_fees.len()
    );
    let rows: Vec<CourseFeeRow> = report
        .orphaned_fees
        .iter()
        .map(|f| CourseFeeRow {
            id: f.id.to_string(),
            course: format!("{} (missing)", f.course_id),
            name: f.fee_name.clone(),
            rate: format_money(f.monthly_rate, &config.institute.currency_symbol),
        })
        .collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    if prune {
        let mut removed = 0;
        for fee in &report.orphaned_fees {
            if store.delete_course_fee(&fee.id)? {
                removed += 1;
            }
        }
        println!("Removed {removed} orphaned course fee record(s)");
    } else {
        println!("Run 'tuition validate --prune' to remove them.");
    }

    Ok(())
}

fn cmd_export(cfg_dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let (_, store) = open(cfg_dir)?;
    let json = store.export_json()?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json)?;
            let stats = store.get_stats();
            println!("Exported to {}", path.display());
            println!(
                "  {} courses, {} fees, {} course fees, {} students",
                stats.course_count,
                stats.general_fee_count,
                stats.course_fee_count,
                stats.student_count
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_import(cfg_dir: &Path, file: &Path, force: bool) -> Result<()> {
    if !force {
        return Err(TuitionError::ImportNotConfirmed);
    }

    let (_, mut store) = open(cfg_dir)?;
    let json = std::fs::read_to_string(file)?;
    let snapshot = store.import_all_data(&json)?;

    println!("Imported {}", file.display());
    println!(
        "  {} courses, {} fees, {} course fees, {} students (exported {})",
        snapshot.courses.len(),
        snapshot.general_fees.len(),
        snapshot.course_fees.len(),
        snapshot.students.len(),
        snapshot.exported_at.format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}
