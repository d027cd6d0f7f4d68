//! Minimal page rendering.
//!
//! Pressroom deliberately carries no templating pipeline: a page renders as
//! structural HTML (title, composers, pagelets) that a site stylesheet can
//! shape. The template name only selects the wrapper class, so rendered
//! output stays cacheable per (page, template) pair.

use crate::domain::page::{Composer, Pagelet};
use crate::domain::resource::{Resource, ResourceBody};
use crate::util::xml;

/// Render a page resource to an HTML document.
pub fn render_page(resource: &Resource) -> String {
    let template = resource.template().unwrap_or("default");
    let mut out = String::from("<!DOCTYPE html>\n<html>\n<head>");

    let title = match resource.body() {
        ResourceBody::Page(body) => body.title().unwrap_or(&resource.uri().path),
        ResourceBody::Binary(content) => content.filename.as_str(),
    };
    out.push_str(&format!("<title>{}</title>", xml::escape(title)));
    out.push_str("</head>\n");
    out.push_str(&format!(
        "<body class=\"template-{}\">\n",
        xml::escape(template)
    ));

    if let ResourceBody::Page(body) = resource.body() {
        for composer in body.composers() {
            out.push_str(&render_composer(composer));
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Render a single composer; also used for independently cached response
/// parts.
pub fn render_composer(composer: &Composer) -> String {
    let mut out = format!(
        "<div class=\"composer\" data-composer=\"{}\">\n",
        xml::escape(composer.name())
    );
    for pagelet in composer.pagelets() {
        out.push_str(&render_pagelet(pagelet));
    }
    out.push_str("</div>\n");
    out
}

fn render_pagelet(pagelet: &Pagelet) -> String {
    let mut out = format!(
        "<section class=\"pagelet\" data-module=\"{}\" data-renderer=\"{}\">\n",
        xml::escape(pagelet.module()),
        xml::escape(pagelet.id())
    );
    for (name, value) in pagelet.elements() {
        out.push_str(&format!(
            "<div data-element=\"{}\">{}</div>\n",
            xml::escape(name),
            xml::escape(value)
        ));
    }
    out.push_str("</section>\n");
    out
}
