//! The render module turns a resolved request into the literal configuration entry text for
//! the guest.  The `EntryRenderer` trait is the seam the provisioning pipeline consumes; the
//! shipped implementation is a Handlebars registry over the embedded entry templates.
//!
//! A rendered entry carries its own sentinel markers; the templates and `entry`'s stripping
//! logic share that contract.
use crate::requests::NetworkRequest;
use handlebars::Handlebars;
use snafu::{OptionExt, ResultExt};

const TEMPLATES: &[(&str, &str)] = &[
    ("network_dhcp", include_str!("../templates/network_dhcp.hbs")),
    (
        "network_static",
        include_str!("../templates/network_static.hbs"),
    ),
    (
        "network_static6",
        include_str!("../templates/network_static6.hbs"),
    ),
];

/// Renders a configuration entry from a template key and a context map.
pub(crate) trait EntryRenderer {
    fn render(&self, template_key: &str, context: &serde_json::Value) -> Result<String>;
}

/// The built-in renderer: one registered Handlebars template per entry kind.
pub(crate) struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    pub(crate) fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        for &(key, body) in TEMPLATES {
            registry
                .register_template_string(key, body)
                .context(error::RegisterSnafu { template: key })?;
        }
        Ok(Self { registry })
    }
}

impl EntryRenderer for TemplateRenderer {
    fn render(&self, template_key: &str, context: &serde_json::Value) -> Result<String> {
        self.registry
            .render(template_key, context)
            .context(error::RenderSnafu {
                template: template_key,
            })
    }
}

/// Build the render context for a resolved request: the request's opaque options plus the
/// assigned device name.
pub(crate) fn entry_context(request: &NetworkRequest) -> Result<serde_json::Value> {
    let device = request
        .device
        .as_ref()
        .context(error::UnresolvedRequestSnafu)?;

    let mut context = serde_json::to_value(&request.options).context(error::ContextSnafu)?;
    context
        .as_object_mut()
        .context(error::ContextShapeSnafu)?
        .insert(
            "device".to_string(),
            serde_json::Value::String(device.to_string()),
        );
    Ok(context)
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to register entry template '{}': {}", template, source))]
        Register {
            template: String,
            source: handlebars::TemplateError,
        },

        #[snafu(display("Failed to render entry template '{}': {}", template, source))]
        Render {
            template: String,
            source: handlebars::RenderError,
        },

        #[snafu(display("Request has no assigned device to render for"))]
        UnresolvedRequest,

        #[snafu(display("Failed to build render context: {}", source))]
        Context { source: serde_json::Error },

        #[snafu(display("Request options are not a table"))]
        ContextShape,
    }
}

pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{BLOCK_BEGIN, BLOCK_END};
    use crate::requests::RequestSet;

    fn resolved_request(toml: &str, device: &str) -> NetworkRequest {
        let mut set: RequestSet = toml.parse().unwrap();
        let mut request = set.requests.remove(0);
        request.device = Some(std::convert::TryFrom::try_from(device).unwrap());
        request
    }

    #[test]
    fn dhcp_entry_carries_markers_and_device() {
        let request = resolved_request(
            r#"
            [[request]]
            slot = 1
            kind = "dhcp"
        "#,
            "eth1",
        );

        let renderer = TemplateRenderer::new().unwrap();
        let context = entry_context(&request).unwrap();
        let entry = renderer.render(request.kind.template_key(), &context).unwrap();

        assert!(entry.starts_with(BLOCK_BEGIN));
        assert!(entry.trim_end().ends_with(BLOCK_END));
        assert!(entry.contains("DEVICE=eth1"));
        assert!(entry.contains("BOOTPROTO=dhcp"));
    }

    #[test]
    fn static_entry_renders_addressing_options() {
        let request = resolved_request(
            r#"
            [[request]]
            slot = 1
            kind = "static"
            [request.options]
            ip = "192.168.50.10"
            netmask = "255.255.255.0"
            gateway = "192.168.50.1"
        "#,
            "eno1",
        );

        let renderer = TemplateRenderer::new().unwrap();
        let context = entry_context(&request).unwrap();
        let entry = renderer.render(request.kind.template_key(), &context).unwrap();

        assert!(entry.contains("IPADDR=192.168.50.10"));
        assert!(entry.contains("NETMASK=255.255.255.0"));
        assert!(entry.contains("GATEWAY=192.168.50.1"));
        assert!(entry.contains("DEVICE=eno1"));
    }

    #[test]
    fn optional_fields_drop_out() {
        let request = resolved_request(
            r#"
            [[request]]
            slot = 1
            kind = "static"
            [request.options]
            ip = "192.168.50.10"
        "#,
            "eth0",
        );

        let renderer = TemplateRenderer::new().unwrap();
        let context = entry_context(&request).unwrap();
        let entry = renderer.render(request.kind.template_key(), &context).unwrap();

        assert!(!entry.contains("NETMASK"));
        assert!(!entry.contains("GATEWAY"));
    }

    #[test]
    fn unresolved_request_cannot_build_a_context() {
        let mut set: RequestSet = r#"
            [[request]]
            slot = 1
            kind = "dhcp"
        "#
        .parse()
        .unwrap();
        let request = set.requests.remove(0);
        assert!(entry_context(&request).is_err());
    }

    #[test]
    fn unknown_template_is_an_error() {
        let renderer = TemplateRenderer::new().unwrap();
        assert!(renderer.render("network_token_ring", &serde_json::json!({})).is_err());
    }
}
