//! HTML page rendering
//!
//! Pages are askama templates under `templates/`, all extending
//! `base.html`. Only requests that passed the gate reach a protected page;
//! the login page is the one public page.

use askama::Template;

use super::files::FileEntry;
use super::subsystems::{SubsystemState, SubsystemStatus};
use crate::error::Result;
/// Page identity, also the active navigation item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Login form or OAuth link
    Login,
    /// Landing page after login
    Dashboard,
    /// File manager
    Files,
    /// Notes
    Notes,
    /// To-do list
    Todos,
    /// Subsystem process control
    Subsystems,
}

impl Page {
    /// Navigation entries, in display order
    pub const NAV: [Page; 5] = [
        Page::Dashboard,
        Page::Files,
        Page::Notes,
        Page::Todos,
        Page::Subsystems,
    ];

    /// Route serving the page
    pub fn path(self) -> &'static str {
        match self {
            Page::Login => "/login",
            Page::Dashboard => "/",
            Page::Files => "/files",
            Page::Notes => "/notes",
            Page::Todos => "/todos",
            Page::Subsystems => "/subsystems",
        }
    }

    /// Human-readable title
    pub fn title(self) -> &'static str {
        match self {
            Page::Login => "Login",
            Page::Dashboard => "Dashboard",
            Page::Files => "Files",
            Page::Notes => "Notes",
            Page::Todos => "To-do",
            Page::Subsystems => "Subsystems",
        }
    }
}

/// Data a page is rendered from
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Page to render
    pub page: Page,
    /// Authenticated identity, shown in the header
    pub identity: Option<String>,
    /// One-line status message (e.g. a failed login attempt)
    pub message: Option<String>,
    /// OAuth authorization URL; a login page with one renders a link instead of a form
    pub login_url: Option<String>,
    /// File listing
    pub files: Vec<FileEntry>,
    /// Subsystem statuses
    pub subsystems: Vec<SubsystemStatus>,
    /// Notes
    pub notes: Vec<String>,
    /// To-do items
    pub todos: Vec<String>,
}

impl PageContext {
    /// Empty context for a page
    pub fn new(page: Page) -> Self {
        Self {
            page,
            identity: None,
            message: None,
            login_url: None,
            files: Vec::new(),
            subsystems: Vec::new(),
            notes: Vec::new(),
            todos: Vec::new(),
        }
    }

    /// Set the authenticated identity
    pub fn with_identity(mut self, identity: Option<String>) -> Self {
        self.identity = identity;
        self
    }

    /// Set the status message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the OAuth authorization URL
    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    /// Set the file listing
    pub fn with_files(mut self, files: Vec<FileEntry>) -> Self {
        self.files = files;
        self
    }

    /// Set the subsystem statuses
    pub fn with_subsystems(mut self, subsystems: Vec<SubsystemStatus>) -> Self {
        self.subsystems = subsystems;
        self
    }
}

/// Turns a page context into a document body
pub trait PageRenderer: Send + Sync {
    /// Render a full HTML document
    fn render(&self, context: &PageContext) -> Result<String>;
}

/// Navigation link in the page header
struct NavLink {
    path: &'static str,
    title: &'static str,
    active: bool,
}

/// Fields shared by every page through `base.html`
struct Layout<'a> {
    site: &'a str,
    title: &'static str,
    nav: Vec<NavLink>,
    identity: Option<&'a str>,
    message: Option<&'a str>,
}

impl<'a> Layout<'a> {
    fn new(site: &'a str, context: &'a PageContext) -> Self {
        // The login page has no navigation
        let nav = if context.page == Page::Login {
            Vec::new()
        } else {
            Page::NAV
                .iter()
                .map(|&page| NavLink {
                    path: page.path(),
                    title: page.title(),
                    active: page == context.page,
                })
                .collect()
        };

        Self {
            site,
            title: context.page.title(),
            nav,
            identity: context.identity.as_deref(),
            message: context.message.as_deref(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    layout: Layout<'a>,
    login_url: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    layout: Layout<'a>,
}

#[derive(Template)]
#[template(path = "files.html")]
struct FilesTemplate<'a> {
    layout: Layout<'a>,
    files: &'a [FileEntry],
}

/// Notes and to-do pages share one list template
#[derive(Template)]
#[template(path = "list.html")]
struct ListTemplate<'a> {
    layout: Layout<'a>,
    items: &'a [String],
    empty: &'static str,
}

struct SubsystemRow<'a> {
    id: &'a str,
    state: &'static str,
    action: &'static str,
}

#[derive(Template)]
#[template(path = "subsystems.html")]
struct SubsystemsTemplate<'a> {
    layout: Layout<'a>,
    rows: Vec<SubsystemRow<'a>>,
}

/// Renderer backed by the compiled askama templates
#[derive(Debug, Clone, Default)]
pub struct TemplatePageRenderer {
    site: String,
}

impl TemplatePageRenderer {
    /// Renderer using `site` as the site name in page titles
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }
}

impl PageRenderer for TemplatePageRenderer {
    fn render(&self, context: &PageContext) -> Result<String> {
        let layout = Layout::new(&self.site, context);
        let html = match context.page {
            Page::Login => LoginTemplate {
                layout,
                login_url: context.login_url.as_deref(),
            }
            .render()?,
            Page::Dashboard => DashboardTemplate { layout }.render()?,
            Page::Files => FilesTemplate {
                layout,
                files: &context.files,
            }
            .render()?,
            Page::Notes => ListTemplate {
                layout,
                items: &context.notes,
                empty: "No notes.",
            }
            .render()?,
            Page::Todos => ListTemplate {
                layout,
                items: &context.todos,
                empty: "Nothing to do.",
            }
            .render()?,
            Page::Subsystems => SubsystemsTemplate {
                layout,
                rows: context
                    .subsystems
                    .iter()
                    .map(|subsystem| {
                        let (state, action) = match subsystem.state {
                            SubsystemState::Running => ("running", "stop"),
                            SubsystemState::Stopped => ("stopped", "start"),
                        };
                        SubsystemRow {
                            id: &subsystem.id,
                            state,
                            action,
                        }
                    })
                    .collect(),
            }
            .render()?,
        };
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn render(context: PageContext) -> String {
        TemplatePageRenderer::new("gatehouse").render(&context).unwrap()
    }

    #[test]
    fn test_login_form_and_message() {
        let html = render(PageContext::new(Page::Login).with_message("Login failed! Attempt 1 of 3."));
        assert!(html.contains("<title>Login - gatehouse</title>"));
        assert!(html.contains("<h2>Login failed! Attempt 1 of 3.</h2>"));
        assert!(html.contains("name=\"password\""));
        assert!(html.contains("Try again"));
        assert!(!html.contains("<nav>"));
    }

    #[test]
    fn test_oauth_login_link() {
        let html = render(
            PageContext::new(Page::Login)
                .with_login_url("https://github.com/login/oauth/authorize?client_id=a&state=b"),
        );
        assert!(html.contains("Login with GitHub"));
        assert!(html.contains("client_id=a"));
        // The raw ampersand is escaped inside the attribute
        assert!(!html.contains("client_id=a&state=b"));
        assert!(!html.contains("<form"));
    }

    #[test]
    fn test_active_nav_and_escaped_identity() {
        let html = render(
            PageContext::new(Page::Files)
                .with_identity(Some("<octocat>".to_string()))
                .with_files(vec![FileEntry {
                    name: "a&b.txt".to_string(),
                    size: 3,
                    modified: Utc::now(),
                }]),
        );
        assert!(html.contains("<a href=\"/files\" class=\"active\">Files</a>"));
        assert!(html.contains("<a href=\"/notes\">Notes</a>"));
        assert!(!html.contains("<octocat>"));
        assert!(html.contains("octocat"));
        assert!(html.contains("/files/a%26b.txt"));
        assert!(!html.contains(">a&b.txt<"));
    }

    #[test]
    fn test_dashboard_greets_identity() {
        let html = render(PageContext::new(Page::Dashboard).with_identity(Some("p4rge".to_string())));
        assert!(html.contains("Welcome, p4rge."));
        assert!(html.contains("action=\"/logout\""));
    }

    #[test]
    fn test_subsystem_actions() {
        let html = render(PageContext::new(Page::Subsystems).with_subsystems(vec![
            SubsystemStatus {
                id: "worker".to_string(),
                state: SubsystemState::Running,
                pid: Some(42),
                exit_code: None,
            },
            SubsystemStatus {
                id: "indexer".to_string(),
                state: SubsystemState::Stopped,
                pid: None,
                exit_code: None,
            },
        ]));
        assert!(html.contains("action=\"/subsystems/worker/stop\""));
        assert!(html.contains("action=\"/subsystems/indexer/start\""));
    }

    #[test]
    fn test_empty_lists() {
        assert!(render(PageContext::new(Page::Notes)).contains("No notes."));
        assert!(render(PageContext::new(Page::Todos)).contains("Nothing to do."));
    }
}
