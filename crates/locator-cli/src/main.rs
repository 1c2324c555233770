//! Command-line proximity search against a locations database.

use std::env;
use std::fs;
use std::slice::Iter;

use anyhow::{bail, Context, Result};
use locator_core::{
    Database, Filter, NearbyQuery, Position, Projection, QueryOptions, UnitSystem,
};

const USAGE: &str = "\
usage: locator <database> <lat> <lng> [options]

options:
  --radius <n>          search radius in the active unit (default 50)
  --metric              report distances in kilometers
  --limit <n>           return at most n rows
  --start <n>           first row of the returned page (0-based)
  --columns <a,b,c>     columns to return (default: all)
  --filter <col=value>  equality filter, repeatable
  --like <col=pattern>  LIKE filter, repeatable
  --options <file>      JSON options bundle; flags override its settings
";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("{USAGE}");
    }

    let database = &args[0];
    let lat: f64 = args[1].parse().context("latitude must be a number")?;
    let lng: f64 = args[2].parse().context("longitude must be a number")?;

    let query = build_query(&args[3..])?;

    let db = Database::open(database).with_context(|| format!("opening {database}"))?;
    let result = db.find_nearby_at(&query, Position::new(lat, lng))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn build_query(flags: &[String]) -> Result<NearbyQuery> {
    // An options file forms the base; flags override its settings.
    let mut query = match options_file(flags)? {
        Some(options) => NearbyQuery::from_options(options),
        None => NearbyQuery::new(),
    };

    let mut rest = flags.iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--radius" => {
                let value = flag_value(&mut rest, flag)?;
                query = query.with_radius(value.parse().context("--radius must be a number")?);
            }
            "--metric" => query = query.with_units(UnitSystem::Metric),
            "--limit" => {
                let value = flag_value(&mut rest, flag)?;
                query.limit_length = value.parse().context("--limit must be an integer")?;
            }
            "--start" => {
                let value = flag_value(&mut rest, flag)?;
                query.limit_start = value.parse().context("--start must be an integer")?;
            }
            "--columns" => {
                let value = flag_value(&mut rest, flag)?;
                query.columns = Projection::columns(value.split(','));
            }
            "--filter" => {
                let (column, value) = column_value_pair(flag_value(&mut rest, flag)?)?;
                query = query.with_filter(Filter::equals(column, value));
            }
            "--like" => {
                let (column, value) = column_value_pair(flag_value(&mut rest, flag)?)?;
                query = query.with_filter(Filter::like(column, value));
            }
            "--options" => {
                // Already folded in; skip the path argument.
                rest.next();
            }
            other => bail!("unknown option {other}\n\n{USAGE}"),
        }
    }
    Ok(query)
}

fn options_file(flags: &[String]) -> Result<Option<QueryOptions>> {
    let Some(index) = flags.iter().position(|flag| flag == "--options") else {
        return Ok(None);
    };
    let path = flags
        .get(index + 1)
        .context("--options requires a file path")?;
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let options = serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    Ok(Some(options))
}

fn flag_value<'a>(rest: &mut Iter<'a, String>, flag: &str) -> Result<&'a String> {
    rest.next()
        .with_context(|| format!("{flag} requires a value"))
}

fn column_value_pair(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .with_context(|| format!("expected <column>=<value>, got {raw:?}"))
}
