use serde_json::Value;

pub const VIEWS_OWNER_CREATE_OR_UPDATE_FORM: &str = "owners/createOrUpdateOwnerForm";
pub const VIEWS_FIND_OWNERS: &str = "owners/findOwners";
pub const VIEWS_OWNERS_LIST: &str = "owners/ownersList";
pub const VIEWS_OWNER_DETAILS: &str = "owners/ownerDetails";

/// Whether a page is rendered whole or only its `body` block, for clients
/// that swap page content in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Full,
    Fragment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: &'static str,
    pub mode: RenderMode,
    pub model: Value,
}

impl View {
    pub fn new(name: &'static str, mode: RenderMode, model: Value) -> Self {
        Self { name, mode, model }
    }

    pub fn full(name: &'static str, model: Value) -> Self {
        Self::new(name, RenderMode::Full, model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Render(View),
    Redirect(String),
}

impl ViewOutcome {
    pub fn view(&self) -> Option<&View> {
        match self {
            Self::Render(view) => Some(view),
            Self::Redirect(_) => None,
        }
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Self::Render(_) => None,
            Self::Redirect(location) => Some(location),
        }
    }
}

pub fn owner_path(owner_id: impl std::fmt::Display) -> String {
    format!("/owners/{owner_id}")
}
