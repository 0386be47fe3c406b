use cropwise_api::db::{configure_connection, establish_pool};
use cropwise_api::fields::all_fields;
use cropwise_api::outbreak::{distance_meters, GeoPoint};
use cropwise_api::utils::{
    log_check_header, log_check_totals, log_field_check, log_generic_error,
};
use std::collections::HashSet;
use std::env;
use std::process;

fn print_usage() {
    eprintln!("Usage: geofence-check <lat> <lon> <radius-meters>");
    eprintln!();
    eprintln!("Evaluates a hypothetical outbreak alert against every registered");
    eprintln!("field in the database (DATABASE_URL, default cropwise.db) and");
    eprintln!("prints which owners an alert at this location would reach.");
    eprintln!("Creator exclusion applies only to real alerts.");
}

fn parse_arg(args: &[String], index: usize) -> f64 {
    match args.get(index).and_then(|a| a.parse().ok()) {
        Some(value) => value,
        None => {
            print_usage();
            process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 3 {
        print_usage();
        process::exit(1);
    }
    let latitude = parse_arg(&args, 0);
    let longitude = parse_arg(&args, 1);
    let radius_meters = parse_arg(&args, 2);

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "cropwise.db".to_string());
    let pool = establish_pool(&database_url);
    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(err) => {
            log_generic_error(&err.to_string());
            process::exit(1);
        }
    };
    if let Err(err) = configure_connection(&mut conn) {
        log_generic_error(&err.to_string());
        process::exit(1);
    }

    let all = match all_fields(&mut conn) {
        Ok(all) => all,
        Err(err) => {
            log_generic_error(&err.to_string());
            process::exit(1);
        }
    };

    let center = GeoPoint {
        latitude,
        longitude,
    };
    log_check_header(latitude, longitude, radius_meters);

    let total = all.len();
    let mut inside_count = 0usize;
    let mut owners: HashSet<&str> = HashSet::new();
    for (i, field) in all.iter().enumerate() {
        let last = i + 1 == total;
        match field.location() {
            Some(location) => {
                let d = distance_meters(location, center);
                let inside = d <= radius_meters;
                if inside {
                    inside_count += 1;
                    owners.insert(field.owner_id.as_str());
                }
                log_field_check(&field.name, &field.owner_id, Some(d), inside, last);
            }
            None => log_field_check(&field.name, &field.owner_id, None, false, last),
        }
    }
    log_check_totals(total, inside_count, owners.len());
}
