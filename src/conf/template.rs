//! `template` sections

use super::parse::SectionNode;
use super::{Loader, Vars};
use crate::error::{ConfError, TemplateError};
use crate::template::{Scope, TextTemplate};
use serde_json::Value;
use std::sync::Arc;

/// Subject and body used to render alert notifications
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    /// Source text of the section
    pub text: String,
    pub vars: Vars,
    pub body: Option<TextTemplate>,
    pub subject: Option<TextTemplate>,
}

impl Template {
    /// Render the subject, or an empty string when there is none
    ///
    /// # Errors
    /// Propagates rendering failures.
    pub fn render_subject(&self, data: &Value, scope: &Scope<'_>) -> Result<String, TemplateError> {
        render(self.subject.as_ref(), data, scope)
    }

    /// Render the body, or an empty string when there is none
    ///
    /// # Errors
    /// Propagates rendering failures.
    pub fn render_body(&self, data: &Value, scope: &Scope<'_>) -> Result<String, TemplateError> {
        render(self.body.as_ref(), data, scope)
    }
}

fn render(t: Option<&TextTemplate>, data: &Value, scope: &Scope<'_>) -> Result<String, TemplateError> {
    match t {
        Some(t) => t.render(data, scope),
        None => Ok(String::new()),
    }
}

impl Loader<'_> {
    pub(super) fn load_template(&mut self, s: &SectionNode) -> Result<(), ConfError> {
        let name = &s.name;
        if self.conf.templates.contains_key(name) {
            return Err(self.error(s, format!("duplicate template name: {}", name)));
        }

        let mut t = Template {
            name: name.clone(),
            text: s.raw_text.clone(),
            vars: Vars::new(),
            body: None,
            subject: None,
        };
        for p in self.section_pairs(s, Some(&mut t.vars), false)? {
            let compiled = || {
                TextTemplate::parse(name, &p.val).map_err(|e| self.error(&p.node, e.to_string()))
            };
            match p.key.as_str() {
                "body" => t.body = Some(compiled()?),
                "subject" => t.subject = Some(compiled()?),
                key => return Err(self.error(&p.node, format!("unknown key {}", key))),
            }
        }

        self.conf.templates.insert(name.clone(), Arc::new(t));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::conf::{Conf, Vars};
    use crate::template::Scope;
    use serde_json::json;

    #[test]
    fn test_template_section() {
        let text = r#"
$team = ops
template cpu {
    $owner = ${team}-oncall
    subject = `{{.Alert.Name}} is {{.Status}}`
    body = `<p>Owner: $owner, paged by {{V "$team"}}</p>`
}
"#;
        let conf = Conf::new("t.conf", text).unwrap();
        let t = &conf.templates["cpu"];
        let scope = Scope {
            locals: None,
            globals: &conf.vars,
        };
        let data = json!({"Alert": {"Name": "cpu.high"}, "Status": "critical"});
        assert_eq!(t.render_subject(&data, &scope).unwrap(), "cpu.high is critical");
        assert_eq!(
            t.render_body(&data, &scope).unwrap(),
            "<p>Owner: ops-oncall, paged by ops</p>"
        );
    }

    #[test]
    fn test_locals_shadow_globals() {
        let conf = Conf::new("t.conf", "$team = ops\ntemplate t {\n body = `{{V .Ref}}`\n}\n").unwrap();
        let mut locals = Vars::new();
        locals.insert("$team".to_string(), "db".to_string());
        let scope = Scope {
            locals: Some(&locals),
            globals: &conf.vars,
        };
        let data = json!({"Ref": "$team"});
        assert_eq!(conf.templates["t"].render_body(&data, &scope).unwrap(), "db");
    }

    #[test]
    fn test_missing_parts_render_empty() {
        let conf = Conf::new("t.conf", "template t {\n subject = s\n}\n").unwrap();
        let scope = Scope {
            locals: None,
            globals: &conf.vars,
        };
        assert_eq!(conf.templates["t"].render_body(&json!({}), &scope).unwrap(), "");
    }

    #[test]
    fn test_template_errors() {
        let err = Conf::new("t.conf", "template t {\n subject = {{nope}}\n}\n").unwrap_err();
        assert!(err.message().contains("not defined"), "{}", err);

        let err = Conf::new("t.conf", "template t {\n color = red\n}\n").unwrap_err();
        assert_eq!(err.message(), "unknown key color");

        let err = Conf::new("t.conf", "template t {\n}\ntemplate t {\n}\n").unwrap_err();
        assert_eq!(err.message(), "duplicate template name: t");
    }
}
