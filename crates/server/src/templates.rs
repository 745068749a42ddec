use minijinja::Environment;
use serde::Serialize;
use server_api::RenderMode;

/// Block every page defines; fragment requests receive only this block.
pub const FRAGMENT_BLOCK: &str = "body";

pub const ERROR_VIEW: &str = "error";
pub const WELCOME_VIEW: &str = "welcome";

const SOURCES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("welcome.html", include_str!("../templates/welcome.html")),
    ("error.html", include_str!("../templates/error.html")),
    (
        "owners/createOrUpdateOwnerForm.html",
        include_str!("../templates/owners/createOrUpdateOwnerForm.html"),
    ),
    (
        "owners/findOwners.html",
        include_str!("../templates/owners/findOwners.html"),
    ),
    (
        "owners/ownersList.html",
        include_str!("../templates/owners/ownersList.html"),
    ),
    (
        "owners/ownerDetails.html",
        include_str!("../templates/owners/ownerDetails.html"),
    ),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in SOURCES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Renders the view named `name` (without the `.html` suffix).
    pub fn render<S: Serialize>(
        &self,
        name: &str,
        mode: RenderMode,
        ctx: S,
    ) -> Result<String, minijinja::Error> {
        let template = self.env.get_template(&format!("{name}.html"))?;
        match mode {
            RenderMode::Full => template.render(ctx),
            RenderMode::Fragment => template.eval_to_state(ctx)?.render_block(FRAGMENT_BLOCK),
        }
    }
}

#[cfg(test)]
#[path = "tests/templates_tests.rs"]
mod tests;
