use crate::filter::CategoryFilter;
use crate::form::ParamLocation;
use crate::http::HttpClient;
use crate::identity::{find_user, users_of_type, IdentityType, TestUser};
use crate::render;
use crate::session::Session;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::io::{BufRead, Write};

const HELP: &str = "\
commands:
  users [private|public]          list test users
  user <id|none>                  act as a test user
  categories                      list categories
  category <id|all>               filter endpoints by category
  search [text]                   filter endpoints by name
  list                            show visible endpoints
  select <endpoint>               pick an endpoint (clears values)
  show                            endpoint form, values and URL
  set <path|query|body> <name> [value]
                                  arrays may span lines until ] closes
  unset <path|query|body> <name>
  send                            send the request
  response                        show the last response
  save <file>                     write the last payload as JSON
  quit";

enum Flow {
    Continue,
    Quit,
}

/// Line-driven tester session.
pub struct Explorer<'c> {
    session: Session<'c>,
    users: &'c [TestUser],
    client: &'c HttpClient,
    category: CategoryFilter,
    search: String,
    pretty: bool,
}

impl<'c> Explorer<'c> {
    pub fn new(session: Session<'c>, users: &'c [TestUser], client: &'c HttpClient, pretty: bool) -> Self {
        Self {
            session,
            users,
            client,
            category: CategoryFilter::All,
            search: String::new(),
            pretty,
        }
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        writeln!(out, "testing {} (type help)", self.client.base_url())?;
        let mut lines = input.lines();
        loop {
            write!(out, "{}> ", self.prompt())?;
            out.flush()?;
            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let mut line = line.context("read input")?.trim().to_string();
            if line.is_empty() {
                continue;
            }
            while line.starts_with("set ") && open_brackets(&line) > 0 {
                write!(out, "... ")?;
                out.flush()?;
                let Some(next) = lines.next() else {
                    break;
                };
                line.push('\n');
                line.push_str(&next.context("read input")?);
            }
            match self.execute(&line, out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        let user = self
            .session
            .identity()
            .map(|u| format!("user {}", u.id))
            .unwrap_or_else(|| "no user".to_string());
        match self.session.endpoint() {
            Some(endpoint) => format!("[{user}] {}", endpoint.id),
            None => format!("[{user}]"),
        }
    }

    fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let (command, rest) = split_word(line);
        match command {
            "help" => writeln!(out, "{HELP}")?,
            "quit" | "exit" => return Ok(Flow::Quit),
            "users" => {
                let kind = match rest {
                    "" => None,
                    "private" => Some(IdentityType::Private),
                    "public" => Some(IdentityType::Public),
                    other => bail!("unknown user type {other}"),
                };
                let users: Vec<&TestUser> = match kind {
                    Some(kind) => users_of_type(self.users, kind).collect(),
                    None => self.users.iter().collect(),
                };
                for user in users {
                    writeln!(out, "{}", render::user_line(user))?;
                }
            }
            "user" => {
                if rest == "none" {
                    self.session.set_identity(None);
                } else {
                    let id: u32 = rest.parse().map_err(|_| anyhow!("invalid user id {rest:?}"))?;
                    let user = find_user(self.users, id).ok_or_else(|| anyhow!("unknown user {id}"))?;
                    self.session.set_identity(Some(user));
                    writeln!(out, "acting as {}", render::user_line(user).trim_start())?;
                }
            }
            "categories" => {
                for line in render::category_lines(self.session.catalog()) {
                    writeln!(out, "{line}")?;
                }
            }
            "category" => {
                let filter = CategoryFilter::parse(rest);
                if let CategoryFilter::Only(id) = &filter {
                    if self.session.catalog().category(id).is_none() {
                        bail!("unknown category {id}");
                    }
                }
                self.category = filter;
            }
            "search" => self.search = rest.to_string(),
            "list" => {
                let endpoints = self.session.visible_endpoints(self.category.clone(), &self.search);
                if endpoints.is_empty() {
                    writeln!(out, "no endpoints found")?;
                }
                for endpoint in endpoints {
                    writeln!(out, "{}", render::endpoint_line(endpoint))?;
                }
            }
            "select" => {
                let endpoint = self.session.select_endpoint(rest)?;
                write!(out, "{}", render::describe(endpoint, Some(self.session.draft())))?;
            }
            "show" => self.show(out)?,
            "set" | "unset" => {
                let (location, rest) = split_word(rest);
                let location = ParamLocation::parse(location)
                    .ok_or_else(|| anyhow!("expected path, query or body, got {location:?}"))?;
                let (name, value) = split_word(rest);
                if name.is_empty() {
                    bail!("missing param name");
                }
                let value = if command == "unset" { "" } else { value };
                self.session.fill(location, name, value)?;
            }
            "send" => {
                let record = self.session.send(self.client)?;
                write!(out, "{}", render::response(record, self.pretty)?)?;
            }
            "response" => match self.session.response() {
                Some(record) => write!(out, "{}", render::response(record, self.pretty)?)?,
                None => writeln!(out, "no response yet")?,
            },
            "save" => {
                let record = self.session.response().ok_or_else(|| anyhow!("no response yet"))?;
                if rest.is_empty() {
                    bail!("missing file name");
                }
                fs::write(rest, render::payload(record, true)?).with_context(|| format!("write {rest}"))?;
                writeln!(out, "saved {rest}")?;
            }
            other => bail!("unknown command {other} (type help)"),
        }
        Ok(Flow::Continue)
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        let endpoint = self
            .session
            .endpoint()
            .ok_or_else(|| anyhow!("no endpoint selected"))?;
        write!(out, "{}", render::describe(endpoint, Some(self.session.draft())))?;
        match self.session.preview() {
            Ok(request) => writeln!(out, "url: {}", request.url())?,
            Err(err) => writeln!(out, "url: incomplete ({err})")?,
        }
        Ok(())
    }
}

/// Unclosed `[`/`{` outside JSON strings.
fn open_brackets(text: &str) -> i32 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::load_catalog;
    use crate::identity::load_test_users;
    use std::io::Cursor;
    use std::time::Duration;

    fn run_script(script: &str) -> String {
        let catalog = load_catalog().unwrap();
        let users = load_test_users().unwrap();
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = HttpClient::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        let mut explorer = Explorer::new(Session::new(&catalog), &users, &client, false);
        let mut out = Vec::new();
        explorer.run(Cursor::new(script), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn fills_and_previews_request() {
        let out = run_script(
            "user 1\nselect get-user\nset path user_id 42\nset query enriched true\nshow\nquit\n",
        );
        assert!(out.contains("acting as 1  private  Sonia Martínez"));
        assert!(out.contains("url: /api/v1/users/42?enriched=true"));
        assert!(out.contains("[user 1] get-user> "));
    }

    #[test]
    fn errors_do_not_end_the_session() {
        let out = run_script("select nope\nselect get-user\nsend\nset body x 1\nbogus\nshow\n");
        assert!(out.contains("error: unknown endpoint nope"));
        assert!(out.contains("error: missing value for path param user_id"));
        assert!(out.contains("error: get-user has no body param x"));
        assert!(out.contains("error: unknown command bogus"));
        assert!(out.contains("url: incomplete (missing value for path param user_id)"));
    }

    #[test]
    fn send_reports_transport_failure() {
        let out = run_script("select get-users\nsend\nresponse\n");
        assert_eq!(out.matches("Status: - (no response)").count(), 2);
    }

    #[test]
    fn listing_respects_identity_category_and_search() {
        let out = run_script("user 86\ncategory contacts\nlist\ncategory users\nsearch subscri\nlist\ncategory nope\n");
        assert!(out.contains("no endpoints found"));
        assert!(!out.contains("subscribe-to-user"));
        assert!(out.contains("error: unknown category nope"));
    }

    #[test]
    fn array_values_may_span_lines() {
        let out = run_script(
            "select sync-contacts\nset body phone_numbers [\n  \"+34600000001\",\n  \"+3460[0000002\"\n]\nshow\n",
        );
        assert_eq!(out.matches("... ").count(), 3);
        assert!(out.contains(r#"["+34600000001","+3460[0000002"]"#));
        assert!(!out.contains("error:"));
    }

    #[test]
    fn open_brackets_ignores_strings() {
        assert_eq!(open_brackets(r#"set body x ["a]", "#), 1);
        assert_eq!(open_brackets(r#"set body x ["\"]"]"#), 0);
        assert_eq!(open_brackets("set query q plain"), 0);
    }

    #[test]
    fn split_word_keeps_rest_verbatim() {
        assert_eq!(split_word("set body name  Ada  Lovelace"), ("set", "body name  Ada  Lovelace"));
        assert_eq!(split_word("list"), ("list", ""));
    }
}
