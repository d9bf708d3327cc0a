use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tether::{DirectiveSite, SiteKind};
use tether_context::TetherProject;

pub fn run(project: &TetherProject, template: Option<&Path>) -> Result<()> {
    let path = project.template_path(template)?;
    let html = project.read_template(template)?;
    let root = tether::parse_html(&html).context("Template contains no element")?;
    let sites = tether::scan(&root).with_context(|| format!("Invalid template {}", path.display()))?;

    for site in &sites {
        println!("  {}", describe(site));
    }
    println!(
        "\n{} {} directive(s) in {}",
        style("OK").green().bold(),
        sites.len(),
        style(path.strip_prefix(&project.root).unwrap_or(&path).display()).dim()
    );
    Ok(())
}

fn describe(site: &DirectiveSite) -> String {
    let line = site.to_string();
    match &site.kind {
        SiteKind::Directive(_) => line,
        SiteKind::Interpolation(_) => style(line).dim().to_string(),
    }
}
