//! HTML shells for the listing and document views.
//!
//! The shells only carry enough script to open the page's WebSocket, render
//! what it streams and, on document pages, send edits back. Documents are
//! rendered in the browser by the external nabladown.js renderer.

/// Browser module that parses and renders documents.
pub const RENDERER_URL: &str = "https://cdn.jsdelivr.net/npm/nabladown.js/dist/web/index.js";

/// Namespace of the shells' entry in browser local storage.
const STORAGE_NAMESPACE: &str = "nabladown-server";

const BASE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{title}}</title>
    <style>
      :root {
        --background-color: rgb(24, 24, 24);
        --text-color: rgba(255, 255, 255, 0.9);
        --fast-transition: 0.3s;
      }
      body {
        background-color: var(--background-color);
        color: var(--text-color);
        font-family: sans-serif;
        font-size: 1.25rem;
        overflow-x: hidden;
      }
      #root {
        margin-left: auto;
        margin-right: auto;
        max-width: 1080px;
        min-width: 333px;
        padding-bottom: 50px;
        transition: opacity var(--fast-transition) ease-in-out;
      }
      #themeButton, #editButton {
        cursor: pointer;
        user-select: none;
      }
      #editor {
        display: block;
        width: 100%;
        min-height: 40vh;
        background-color: var(--background-color);
        color: var(--text-color);
        font-family: monospace;
      }
      #editor[hidden] {
        display: none;
      }
    </style>{{stylesheet}}
  </head>
  <body>
    <header id="header"></header>
    <div id="root"></div>
  </body>
  <script>
    const NablaLocalStorage = (() => {
      const namespace = "{{namespace}}";
      const read = () => JSON.parse(localStorage.getItem(namespace) || "{}");
      return {
        getItem: key => read()[key],
        setItem: (key, value) => {
          const all = read();
          all[key] = value;
          localStorage.setItem(namespace, JSON.stringify(all));
        }
      };
    })();

    (() => {
      let theme = NablaLocalStorage.getItem("theme") || "dark";
      const button = document.createElement("div");
      button.setAttribute("id", "themeButton");
      const apply = () => {
        const dark = theme === "dark";
        button.textContent = dark ? "☀" : "☾";
        const style = document.documentElement.style;
        style.setProperty("--background-color", dark ? "rgb(24,24,24)" : "rgb(255,255,255)");
        style.setProperty("--text-color", dark ? "rgba(255,255,255,0.9)" : "rgba(24,24,24,0.9)");
      };
      apply();
      button.addEventListener("click", () => {
        theme = theme === "dark" ? "light" : "dark";
        apply();
        NablaLocalStorage.setItem("theme", theme);
      });
      document.getElementById("header").appendChild(button);
    })();
  </script>
  <script type="module">
{{script}}
  </script>
</html>
"#;

const LISTING_SCRIPT: &str = r#"
    const escape = text => text.replace(/[&<>"']/g, c => `&#${c.charCodeAt(0)};`);
    const list = nodes => `<ul>${nodes.map(node =>
      node.children.length === 0
        ? `<li><a href="${encodeURI(node.path)}">${escape(node.name)}</a></li>`
        : `<li>${escape(node.name)} ${list(node.children)}</li>`
    ).join("\n")}</ul>`;

    const ws = new WebSocket(`ws://${window.location.host}/`);
    ws.addEventListener("message", event => {
      const nodes = JSON.parse(event.data);
      document.getElementById("root").innerHTML =
        `<h2>{{heading}}</h2>${list(nodes)}`;
    });
    ws.addEventListener("close", () => console.log("Disconnected from the server"));
"#;

const DOCUMENT_SCRIPT: &str = r#"
    import { parse, render } from "{{renderer}}";

    document.addEventListener("scroll", () => {
      NablaLocalStorage.setItem("scroll", document.documentElement.scrollTop);
    });

    const root = document.getElementById("root");
    const show = async text => {
      const previousScroll = NablaLocalStorage.getItem("scroll");
      root.replaceChildren(await render(parse(text)));
      document.documentElement.scrollTop = previousScroll;
    };

    const ws = new WebSocket(`ws://${window.location.host}${window.location.pathname}`);

    // Edits are sent as the whole document; the server writes them to disk
    const editor = document.createElement("textarea");
    editor.setAttribute("id", "editor");
    editor.hidden = true;
    let pending;
    editor.addEventListener("input", () => {
      clearTimeout(pending);
      pending = setTimeout(() => {
        if (ws.readyState === WebSocket.OPEN) ws.send(editor.value);
        show(editor.value);
      }, 300);
    });
    root.before(editor);

    const editButton = document.createElement("div");
    editButton.setAttribute("id", "editButton");
    editButton.textContent = "✎";
    editButton.addEventListener("click", () => {
      editor.hidden = !editor.hidden;
    });
    document.getElementById("header").appendChild(editButton);

    ws.addEventListener("message", event => {
      if (document.activeElement !== editor) editor.value = event.data;
      show(event.data);
    });
    ws.addEventListener("close", () => console.log("Disconnected from the server"));
"#;

/// Renders the HTML shells served by the one-shot routes.
#[derive(Debug, Clone)]
pub struct Pages {
    root_label: String,
    suffix: String,
    stylesheet: Option<String>,
}

impl Pages {
    pub fn new(root_label: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            root_label: root_label.into(),
            suffix: suffix.into(),
            stylesheet: None,
        }
    }

    pub fn with_stylesheet(mut self, stylesheet: Option<String>) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    /// Shell of the directory listing.
    pub fn listing(&self) -> String {
        let heading = format!(
            "Files ({}) in <i>{}</i>",
            escape_html(&self.suffix),
            escape_html(&self.root_label)
        );
        let script = LISTING_SCRIPT.replace("{{heading}}", &escape_js_template(&heading));
        self.base(&format!("List of {} files", self.suffix), &script)
    }

    /// Shell of a single document.
    pub fn document(&self, path: &str) -> String {
        let script = DOCUMENT_SCRIPT.replace("{{renderer}}", RENDERER_URL);
        self.base(path, &script)
    }

    fn base(&self, title: &str, script: &str) -> String {
        let stylesheet = match &self.stylesheet {
            Some(href) => format!(
                "\n    <link rel=\"stylesheet\" href=\"{}\">",
                escape_html(href)
            ),
            None => String::new(),
        };
        BASE_TEMPLATE
            .replace("{{title}}", &escape_html(title))
            .replace("{{stylesheet}}", &stylesheet)
            .replace("{{namespace}}", STORAGE_NAMESPACE)
            .replace("{{script}}", script)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            // Keeps template placeholders out of substituted text
            '{' => out.push_str("&#123;"),
            _ => out.push(c),
        }
    }
    out
}

/// Make already HTML-escaped text safe inside a JS template literal.
fn escape_js_template(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}
