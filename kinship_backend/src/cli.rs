//! Interactive console against the local store.
//!
//! Shares the database and change hub with the HTTP server when both run in
//! one process, so `watch` sees votes landing through the API.

use crate::auth::{AuthService, SessionContext, SignUpInput};
use crate::blog::BlogService;
use crate::config::KinshipConfig;
use crate::database::Database;
use crate::events::EventService;
use crate::polls::PollService;
use crate::realtime::{ChangeHub, ChangeListener, Subscription};
use anyhow::Result;
use shell_words;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run_cli(config: KinshipConfig, database: Database, hub: ChangeHub) -> Result<()> {
    let mut session = CliSession {
        auth: AuthService::new(database.clone(), config.auth.session_ttl_hours),
        polls: PollService::new(database.clone(), hub.clone()),
        blog: BlogService::new(database.clone(), hub.clone()),
        events: EventService::new(database, hub.clone()),
        hub,
        user: None,
        watcher: None,
    };

    println!("Kinship CLI ready. Type 'help' for a list of commands.");

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        print!("kinship> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            println!("Exiting");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens = match shell_words::split(trimmed) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => continue,
            Err(err) => {
                println!("Unable to parse command: {err}");
                continue;
            }
        };

        match session.handle_command(&tokens).await {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Exit) => break,
            Err(err) => {
                println!("Error: {err:#}");
            }
        }
    }
    Ok(())
}

struct CliSession {
    auth: AuthService,
    polls: PollService,
    blog: BlogService,
    events: EventService,
    hub: ChangeHub,
    user: Option<SessionContext>,
    watcher: Option<ChangeListener>,
}

enum LoopAction {
    Continue,
    Exit,
}

impl CliSession {
    async fn handle_command(&mut self, tokens: &[String]) -> Result<LoopAction> {
        let command = tokens[0].as_str();
        match command {
            "help" => {
                self.print_help();
                Ok(LoopAction::Continue)
            }
            "whoami" => {
                match &self.user {
                    Some(ctx) => println!(
                        "{} ({}){}",
                        ctx.full_name.as_deref().unwrap_or("(no name)"),
                        ctx.email,
                        if ctx.is_admin() { " [admin]" } else { "" }
                    ),
                    None => println!("Not signed in. Use 'sign-in <email> <password>'."),
                }
                Ok(LoopAction::Continue)
            }
            "sign-up" => {
                if tokens.len() < 3 {
                    println!("Usage: sign-up <email> <password> [\"Full Name\"]");
                    return Ok(LoopAction::Continue);
                }
                let session = self.auth.sign_up(SignUpInput {
                    email: tokens[1].clone(),
                    password: tokens[2].clone(),
                    full_name: tokens.get(3).cloned(),
                })?;
                println!("Signed up as {}", session.user.email);
                self.user = Some(session.user);
                Ok(LoopAction::Continue)
            }
            "sign-in" => {
                if tokens.len() < 3 {
                    println!("Usage: sign-in <email> <password>");
                    return Ok(LoopAction::Continue);
                }
                let session = self.auth.sign_in(&tokens[1], &tokens[2])?;
                println!("Signed in as {}", session.user.email);
                self.user = Some(session.user);
                Ok(LoopAction::Continue)
            }
            "polls" => {
                self.list_polls()?;
                Ok(LoopAction::Continue)
            }
            "poll-create" => {
                if tokens.len() < 4 {
                    println!("Usage: poll-create \"question\" \"option 1\" \"option 2\" [...]");
                    return Ok(LoopAction::Continue);
                }
                let Some(user) = self.user.clone() else {
                    println!("Sign in first.");
                    return Ok(LoopAction::Continue);
                };
                let view = self.polls.create_poll(
                    crate::polls::CreatePollInput {
                        question: tokens[1].clone(),
                        options: tokens[2..].to_vec(),
                        closes_at: None,
                    },
                    &user,
                )?;
                println!("Created poll {}", view.id);
                Ok(LoopAction::Continue)
            }
            "vote" => {
                if tokens.len() < 3 {
                    println!("Usage: vote <poll_id> <option_index>");
                    return Ok(LoopAction::Continue);
                }
                let Some(user) = self.user.clone() else {
                    println!("Sign in first.");
                    return Ok(LoopAction::Continue);
                };
                let Ok(option_index) = tokens[2].parse::<i64>() else {
                    println!("option_index must be a number");
                    return Ok(LoopAction::Continue);
                };
                let view = self.polls.vote(&tokens[1], option_index, &user)?;
                print_poll(&view);
                Ok(LoopAction::Continue)
            }
            "watch" => {
                self.toggle_watch();
                Ok(LoopAction::Continue)
            }
            "posts" => {
                let category = tokens.get(1).map(String::as_str);
                self.list_posts(category)?;
                Ok(LoopAction::Continue)
            }
            "post" => {
                if tokens.len() < 2 {
                    println!("Usage: post <post_id>");
                    return Ok(LoopAction::Continue);
                }
                self.view_post(&tokens[1])?;
                Ok(LoopAction::Continue)
            }
            "events" => {
                self.list_events()?;
                Ok(LoopAction::Continue)
            }
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
                Ok(LoopAction::Continue)
            }
            "quit" | "exit" => Ok(LoopAction::Exit),
            other => {
                println!("Unknown command '{other}'. Type 'help' for a list of commands.");
                Ok(LoopAction::Continue)
            }
        }
    }

    fn print_help(&self) {
        println!("Available commands:");
        println!("  help                     Show this help message");
        println!("  sign-up EMAIL PASS [NAME] Create an account and sign in");
        println!("  sign-in EMAIL PASS       Sign in as an existing user");
        println!("  whoami                   Show the signed-in user");
        println!("  polls                    List polls with live tallies");
        println!("  poll-create Q OPT OPT..  Create a poll (admin)");
        println!("  vote POLL_ID INDEX       Vote for an option");
        println!("  watch                    Toggle live tally printing on new votes");
        println!("  posts [CATEGORY]         List published blog posts");
        println!("  post POST_ID             Show a post with its comments");
        println!("  events                   List events");
        println!("  clear                    Clear the screen");
        println!("  exit                     Quit the CLI");
    }

    fn list_polls(&self) -> Result<()> {
        let views = self.polls.list_polls(self.user.as_ref())?;
        if views.is_empty() {
            println!("No polls yet.");
            return Ok(());
        }
        for view in views {
            print_poll(&view);
        }
        Ok(())
    }

    /// Re-prints every tally whenever a vote lands, coalescing bursts.
    fn toggle_watch(&mut self) {
        if self.watcher.take().is_some() {
            println!("Stopped watching.");
            return;
        }
        let polls = self.polls.clone();
        let listener = ChangeListener::spawn(
            &self.hub,
            Subscription::table("poll_votes"),
            move || {
                let polls = polls.clone();
                async move {
                    let views = polls.list_polls(None)?;
                    println!();
                    println!("--- tallies updated ---");
                    for view in views {
                        print_poll(&view);
                    }
                    print!("kinship> ");
                    let _ = io::stdout().flush();
                    Ok(())
                }
            },
        );
        self.watcher = Some(listener);
        println!("Watching poll votes. Run 'watch' again to stop.");
    }

    fn list_posts(&self, category: Option<&str>) -> Result<()> {
        let posts = self.blog.list_posts(category)?;
        if posts.is_empty() {
            println!("No posts yet.");
            return Ok(());
        }
        for post in posts {
            println!(
                "  [{}] {} (likes: {}, comments: {})",
                post.id, post.title, post.like_count, post.comment_count
            );
            if !post.excerpt.is_empty() {
                println!("      {}", post.excerpt);
            }
        }
        Ok(())
    }

    fn view_post(&self, post_id: &str) -> Result<()> {
        let details = self.blog.get_post(post_id, self.user.as_ref())?;
        println!("{}", details.title);
        println!(
            "by {} at {} (likes: {})",
            details.author_name.as_deref().unwrap_or("(unknown)"),
            details.created_at,
            details.like_count
        );
        println!("{}", details.content);
        if details.comments.is_empty() {
            println!("  (no comments yet)");
        }
        for comment in &details.comments {
            println!(
                "  - {} [{}]: {}",
                comment.author_name.as_deref().unwrap_or("(unknown)"),
                comment.created_at,
                comment.content
            );
        }
        Ok(())
    }

    fn list_events(&self) -> Result<()> {
        let events = self.events.list_events()?;
        if events.is_empty() {
            println!("No events yet.");
            return Ok(());
        }
        for event in events {
            println!(
                "  [{}] {} at {} ({})",
                event.id,
                event.title,
                event.location.as_deref().unwrap_or("TBD"),
                event.event_date
            );
        }
        Ok(())
    }
}

fn print_poll(view: &crate::polls::PollView) {
    println!(
        "  [{}] {}{} ({} votes)",
        view.id,
        view.question,
        if view.closed { " [closed]" } else { "" },
        view.total_votes
    );
    for (index, option) in view.options.iter().enumerate() {
        let marker = if view.user_vote == Some(index as i64) {
            " <- your vote"
        } else {
            ""
        };
        println!(
            "      {}: {} ({}%){}",
            option.label, option.votes, option.percentage, marker
        );
    }
}
