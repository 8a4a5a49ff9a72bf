mod catalog;
mod config;
mod explore;
mod filter;
mod form;
mod http;
mod identity;
mod logging;
mod render;
mod request;
mod session;

use anyhow::{anyhow, Context, Result};
use catalog::{Catalog, Endpoint};
use clap::{Arg, ArgAction, ArgMatches, Command};
use config::Config;
use explore::Explorer;
use filter::CategoryFilter;
use form::{form_fields, Widget};
use http::HttpClient;
use identity::{find_user, users_of_type, IdentityType, TestUser};
use serde_json::json;
use session::Session;
use std::fs;
use std::io;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_logging(config.log_json);

    let catalog = catalog::load_catalog().context("endpoint catalog")?;
    let users = identity::load_test_users().context("test users")?;
    let cli = build_cli(&catalog);
    let matches = cli.get_matches();

    let identity = match matches.get_one::<u32>("user") {
        Some(id) => Some(find_user(&users, *id).ok_or_else(|| anyhow!("unknown test user {id}"))?),
        None => None,
    };

    if let Some(matches) = matches.subcommand_matches("identities") {
        return handle_users(&users, matches);
    }
    if let Some(matches) = matches.subcommand_matches("categories") {
        return handle_categories(&catalog, matches);
    }
    if let Some(matches) = matches.subcommand_matches("list") {
        return handle_list(&catalog, identity, matches);
    }
    if let Some(matches) = matches.subcommand_matches("describe") {
        return handle_describe(&catalog, matches);
    }

    let base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .unwrap_or_else(|| config.base_url.clone());
    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|secs| std::time::Duration::from_secs(*secs))
        .unwrap_or(config.timeout);
    let client = HttpClient::new(base_url, timeout)?;
    let pretty = matches.get_flag("pretty");
    let raw = matches.get_flag("raw");

    let mut session = Session::new(&catalog);
    session.set_identity(identity);

    if matches.subcommand_matches("explore").is_some() {
        let mut explorer = Explorer::new(session, &users, &client, pretty);
        let stdin = io::stdin();
        return explorer.run(stdin.lock(), &mut io::stdout());
    }

    let (_category, category_matches) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("category required"))?;
    let (endpoint_id, endpoint_matches) = category_matches
        .subcommand()
        .ok_or_else(|| anyhow!("endpoint required"))?;

    handle_call(&mut session, &client, endpoint_id, endpoint_matches, pretty, raw)
}

fn build_cli(catalog: &Catalog) -> Command {
    let mut cmd = Command::new("eventypop-tester")
        .about("EventyPop API tester")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .global(true)
                .help("Backend base URL (EVENTYPOP_API_URL)"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .short('u')
                .value_name("ID")
                .global(true)
                .value_parser(clap::value_parser!(u32))
                .help("Test user id sent as X-Test-User-Id"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("HTTP timeout in seconds (EVENTYPOP_TIMEOUT_SECS)"),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Pretty-print JSON output"),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Return status + elapsed time + error + payload"),
        );

    cmd = cmd.subcommand(
        Command::new("identities")
            .about("List test users")
            .arg(
                Arg::new("type")
                    .long("type")
                    .value_name("TYPE")
                    .value_parser(["private", "public"])
                    .help("Only private or public users"),
            )
            .arg(json_flag()),
    );

    cmd = cmd.subcommand(
        Command::new("categories")
            .about("List endpoint categories")
            .arg(json_flag()),
    );

    cmd = cmd.subcommand(
        Command::new("list")
            .about("List endpoints visible to --user")
            .arg(
                Arg::new("category")
                    .long("category")
                    .value_name("ID")
                    .default_value("all")
                    .help("Category id or all"),
            )
            .arg(
                Arg::new("search")
                    .long("search")
                    .value_name("TEXT")
                    .help("Case-insensitive match on endpoint name"),
            )
            .arg(json_flag()),
    );

    cmd = cmd.subcommand(
        Command::new("describe")
            .about("Describe an endpoint and its parameters")
            .arg(Arg::new("endpoint").required(true))
            .arg(json_flag()),
    );

    cmd = cmd.subcommand(Command::new("explore").about("Interactive tester session"));

    for category in catalog.categories() {
        let mut category_cmd = Command::new(category.id.clone())
            .about(format!("{} {}", category.icon, category.name))
            .subcommand_required(true)
            .arg_required_else_help(true);
        for endpoint in catalog.in_category(&category.id) {
            category_cmd = category_cmd.subcommand(build_endpoint_command(endpoint));
        }
        cmd = cmd.subcommand(category_cmd);
    }

    cmd
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Emit machine-readable JSON")
}

fn build_endpoint_command(endpoint: &Endpoint) -> Command {
    let mut cmd = Command::new(endpoint.id.clone())
        .about(format!("{} {}  {}", endpoint.method, endpoint.path, endpoint.name))
        .long_about(endpoint.description.clone());
    for field in form_fields(endpoint) {
        let param = field.param;
        let mut help = param.description.clone().unwrap_or_default();
        if param.required {
            help.push_str(" (required)");
        }
        let mut arg = Arg::new(field.flag.clone())
            .long(field.flag.clone())
            .value_name(param.kind.as_str().to_uppercase())
            .help(help.trim().to_string());
        if field.widget == Widget::TriState {
            arg = arg.value_parser(["true", "false"]);
        }
        cmd = cmd.arg(arg);
    }
    cmd.arg(
        Arg::new("save")
            .long("save")
            .value_name("FILE")
            .help("Also write the response payload to FILE"),
    )
}

fn handle_users(users: &[TestUser], matches: &ArgMatches) -> Result<()> {
    let selected: Vec<&TestUser> = match matches.get_one::<String>("type").map(String::as_str) {
        Some("private") => users_of_type(users, IdentityType::Private).collect(),
        Some("public") => users_of_type(users, IdentityType::Public).collect(),
        _ => users.iter().collect(),
    };
    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }
    for user in selected {
        println!("{}", render::user_line(user));
    }
    Ok(())
}

fn handle_categories(catalog: &Catalog, matches: &ArgMatches) -> Result<()> {
    if matches.get_flag("json") {
        let out: Vec<_> = catalog
            .categories()
            .iter()
            .map(|c| json!({"id": c.id, "name": c.name, "icon": c.icon, "count": catalog.count_in(&c.id)}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    for line in render::category_lines(catalog) {
        println!("{line}");
    }
    Ok(())
}

fn handle_list(catalog: &Catalog, identity: Option<&TestUser>, matches: &ArgMatches) -> Result<()> {
    let category = matches
        .get_one::<String>("category")
        .map(|c| CategoryFilter::parse(c))
        .unwrap_or_default();
    if let CategoryFilter::Only(id) = &category {
        if catalog.category(id).is_none() {
            return Err(anyhow!("unknown category {id}"));
        }
    }
    let filter = filter::EndpointFilter {
        identity,
        category,
        search: matches.get_one::<String>("search").cloned().unwrap_or_default(),
    };
    let endpoints = filter.apply(catalog.endpoints());

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&endpoints)?);
        return Ok(());
    }
    if endpoints.is_empty() {
        println!("no endpoints found");
    }
    for endpoint in endpoints {
        println!("{}", render::endpoint_line(endpoint));
    }
    Ok(())
}

fn handle_describe(catalog: &Catalog, matches: &ArgMatches) -> Result<()> {
    let id = matches
        .get_one::<String>("endpoint")
        .ok_or_else(|| anyhow!("endpoint required"))?;
    let endpoint = catalog
        .find(id)
        .ok_or_else(|| anyhow!("unknown endpoint {id}"))?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(endpoint)?);
        return Ok(());
    }
    print!("{}", render::describe(endpoint, None));
    Ok(())
}

fn handle_call(
    session: &mut Session<'_>,
    client: &HttpClient,
    endpoint_id: &str,
    matches: &ArgMatches,
    pretty: bool,
    raw: bool,
) -> Result<()> {
    let endpoint = session.select_endpoint(endpoint_id)?;
    for field in form_fields(endpoint) {
        if let Some(value) = matches.get_one::<String>(&field.flag) {
            session.fill(field.location, &field.param.name, value)?;
        }
    }

    let record = session.send(client)?;

    if raw {
        let output = serde_json::to_value(record)?;
        if pretty {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string(&output)?);
        }
    } else {
        println!("{}", render::payload(record, pretty)?);
    }

    if let Some(path) = matches.get_one::<String>("save") {
        fs::write(path, render::payload(record, true)?).with_context(|| format!("write {path}"))?;
    }

    if record.is_success() {
        return Ok(());
    }
    Err(anyhow!(
        "{}",
        record.error.as_deref().unwrap_or("request failed")
    ))
}
