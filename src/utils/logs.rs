use console::{measure_text_width, Style};

pub const TREE_BRANCH: char = '\u{251C}';
pub const TREE_END: char = '\u{2514}';
pub const TREE_HORIZ: char = '\u{2500}';

const VALUE_COLUMN: usize = 25;

fn tree_branch() -> String {
    dim()
        .apply_to(format!("{}{}{} ", TREE_BRANCH, TREE_HORIZ, TREE_HORIZ))
        .to_string()
}

fn tree_end() -> String {
    dim()
        .apply_to(format!("{}{}{} ", TREE_END, TREE_HORIZ, TREE_HORIZ))
        .to_string()
}

pub fn dim() -> Style {
    Style::new().dim()
}

fn blue() -> Style {
    Style::new().blue()
}

fn magenta() -> Style {
    Style::new().magenta()
}

fn cyan() -> Style {
    Style::new().cyan()
}

fn green() -> Style {
    Style::new().green()
}

fn red() -> Style {
    Style::new().red()
}

fn yellow() -> Style {
    Style::new().yellow()
}

fn bold() -> Style {
    Style::new().bold()
}

fn init_prefix() -> String {
    blue().apply_to("[INIT]").to_string()
}

fn db_prefix() -> String {
    magenta().apply_to("[DB]").to_string()
}

fn fanout_prefix() -> String {
    yellow().apply_to("[FANOUT]").to_string()
}

pub fn pad_label(label: &str) -> String {
    let current_width = measure_text_width(label);
    if current_width < VALUE_COLUMN {
        format!("{}{}", label, " ".repeat(VALUE_COLUMN - current_width))
    } else {
        format!("{} ", label)
    }
}

pub fn log_startup_config(database_url: &str, port: u16) {
    println!(
        "{} starting cropwise-api on {}...",
        init_prefix(),
        cyan().apply_to(format!("0.0.0.0:{port}")),
    );
    println!(
        "{} database: {}",
        init_prefix(),
        cyan().apply_to(database_url)
    );
}

pub fn log_db_status(message: &str) {
    println!("{} {}", db_prefix(), message);
}

pub fn log_db_ready() {
    println!("{} {}", db_prefix(), green().apply_to("ready."));
}

pub fn log_db_error(error: &str) {
    println!("{} {} {}", db_prefix(), red().apply_to("error:"), error);
}

pub fn log_server_starting(port: u16) {
    println!(
        "{} listening on {}",
        init_prefix(),
        bold().apply_to(format!("0.0.0.0:{port}"))
    );
}

pub fn log_notify_failed(recipient: &str, error: &str) {
    println!(
        "{} notification to {} {}: {}",
        dim().apply_to("dropped"),
        bold().apply_to(recipient),
        red().apply_to("failed"),
        dim().apply_to(error)
    );
}

pub fn log_fanout_error(error: &str) {
    println!(
        "{} {} {}",
        fanout_prefix(),
        red().apply_to("aborted:"),
        dim().apply_to(error)
    );
}

pub fn log_fanout_write_failed(error: &str) {
    println!(
        "{} {} {}",
        fanout_prefix(),
        red().apply_to("write failed:"),
        dim().apply_to(error)
    );
}

pub fn log_fanout_done(alert_title: &str, sent: usize, failed: usize) {
    println!(
        "{} {} done: {} sent, {} failed",
        fanout_prefix(),
        cyan().apply_to(alert_title),
        bold().apply_to(sent),
        if failed > 0 {
            red().apply_to(failed)
        } else {
            dim().apply_to(failed)
        }
    );
}

pub fn log_check_header(latitude: f64, longitude: f64, radius_meters: f64) {
    println!(
        "{} checking fields against {} (radius {})",
        magenta().apply_to(bold().apply_to("[GEOFENCE]")),
        cyan().apply_to(format!("({latitude:.4}, {longitude:.4})")),
        bold().apply_to(format!("{:.0}m", radius_meters))
    );
}

pub fn log_field_check(name: &str, owner: &str, distance: Option<f64>, inside: bool, last: bool) {
    let branch = if last { tree_end() } else { tree_branch() };
    let label = pad_label(&format!("{name} ({owner})"));
    match distance {
        Some(d) => {
            let verdict = if inside {
                green().apply_to("inside").to_string()
            } else {
                dim().apply_to("outside").to_string()
            };
            println!(
                "{}{} {} {}",
                branch,
                label,
                bold().apply_to(format!("{:.0}m", d)),
                verdict
            );
        }
        None => {
            println!("{}{} {}", branch, label, dim().apply_to("no location"));
        }
    }
}

pub fn log_check_totals(total: usize, inside: usize, owners: usize) {
    println!(
        "{} {} fields checked, {} inside, {} owners would be notified",
        magenta().apply_to(bold().apply_to("[GEOFENCE]")),
        bold().apply_to(total),
        bold().apply_to(inside),
        bold().apply_to(owners)
    );
}

pub fn log_generic_error(error: &str) {
    println!("{} {}", red().apply_to("error:"), error);
}
