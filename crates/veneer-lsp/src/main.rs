mod pool;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::warn;
use veneer_core::{HostAnalyzer, NullAnalyzer};
use veneer_transform::{reconcile_diagnostics, MappedDiagnostic, Origin};

use crate::pool::ProjectPool;

/// How long to sit on an edit before recomputing diagnostics. A newer edit
/// within the window supersedes the pending one.
const DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Clone)]
struct Backend {
    client: Client,
    pool: Arc<Mutex<ProjectPool>>,
    /// Last-write-wins revision per document; a debounced task only runs if
    /// its revision is still current when the timer fires.
    revisions: Arc<Mutex<HashMap<Url, u64>>>,
}

impl Backend {
    fn new(client: Client) -> Self {
        Backend {
            client,
            pool: Arc::new(Mutex::new(ProjectPool::new())),
            revisions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn document_updated(&self, uri: Url, text: String, debounce: bool) {
        let Ok(path) = uri.to_file_path() else {
            return;
        };

        let revision = {
            let mut revisions = self.revisions.lock().await;
            let revision = revisions.entry(uri.clone()).or_insert(0);
            *revision += 1;
            *revision
        };

        {
            let mut pool = self.pool.lock().await;
            let project = pool.project_for_file(&path);
            project.overlay.buffer_updated(&path, text);
        }

        if debounce {
            let backend = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(DEBOUNCE).await;
                if backend.current_revision(&uri).await == Some(revision) {
                    backend.refresh_diagnostics(&uri, &path).await;
                }
            });
        } else {
            self.refresh_diagnostics(&uri, &path).await;
        }
    }

    async fn current_revision(&self, uri: &Url) -> Option<u64> {
        self.revisions.lock().await.get(uri).copied()
    }

    /// Recompute and publish diagnostics for the module owning this file.
    async fn refresh_diagnostics(&self, uri: &Url, path: &Path) {
        let diagnostics = {
            let mut pool = self.pool.lock().await;
            let project = pool.project_for_file(path);
            let config = Arc::clone(project.overlay.config());

            let script = if config.is_template(path) {
                config.script_path_for(path)
            } else {
                path.to_path_buf()
            };

            match project.overlay.module_for(&script) {
                Ok(module) => {
                    let mut analyzer = NullAnalyzer;
                    let host = analyzer.diagnose(&module);
                    let mapped = reconcile_diagnostics(&module, &host);
                    Some(group_by_file(mapped, &module))
                }
                Err(error) => {
                    warn!(path = %script.display(), %error, "transform failed");
                    None
                }
            }
        };

        let Some(by_file) = diagnostics else {
            // Publish nothing rather than stale results.
            let _ = self
                .client
                .publish_diagnostics(uri.clone(), Vec::new(), None)
                .await;
            return;
        };

        // Files with no surviving problems still get an explicit empty
        // publish so old squiggles clear.
        let mut published_current = false;
        for (file, contents, diagnostics) in by_file {
            let Ok(file_uri) = Url::from_file_path(&file) else {
                continue;
            };
            published_current |= file_uri == *uri;
            let lsp: Vec<Diagnostic> = diagnostics
                .iter()
                .map(|d| to_lsp_diagnostic(d, &contents))
                .collect();
            let _ = self.client.publish_diagnostics(file_uri, lsp, None).await;
        }
        if !published_current {
            let _ = self
                .client
                .publish_diagnostics(uri.clone(), Vec::new(), None)
                .await;
        }
    }
}

/// Bucket reconciled diagnostics by the file they point into, pairing each
/// bucket with that file's contents for position conversion.
fn group_by_file(
    diagnostics: Vec<MappedDiagnostic>,
    module: &veneer_transform::TransformedModule,
) -> Vec<(PathBuf, String, Vec<MappedDiagnostic>)> {
    let mut files: Vec<(PathBuf, String)> =
        vec![(module.script.path.clone(), module.script.contents.clone())];
    if let Some(template) = &module.template {
        files.push((template.path.clone(), template.contents.clone()));
    }

    files
        .into_iter()
        .map(|(path, contents)| {
            let bucket: Vec<MappedDiagnostic> = diagnostics
                .iter()
                .filter(|d| d.path == path)
                .cloned()
                .collect();
            (path, contents, bucket)
        })
        .collect()
}

fn to_lsp_diagnostic(diagnostic: &MappedDiagnostic, text: &str) -> Diagnostic {
    let start = byte_offset_to_position(text, diagnostic.range.start);
    let end = byte_offset_to_position(
        text,
        if diagnostic.range.end <= diagnostic.range.start {
            diagnostic.range.start + 1
        } else {
            diagnostic.range.end
        },
    );
    Diagnostic {
        range: Range { start, end },
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("veneer".to_string()),
        message: diagnostic.message.clone(),
        code: diagnostic
            .code
            .clone()
            .map(NumberOrString::String),
        ..Diagnostic::default()
    }
}

// Columns are UTF-16 code units, the protocol's default position encoding.

fn byte_offset_to_position(text: &str, byte_offset: usize) -> Position {
    let mut line = 0u32;
    let mut col = 0u32;
    for (idx, ch) in text.char_indices() {
        if idx >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
    }
    Position::new(line, col)
}

fn position_to_byte_offset(text: &str, position: Position) -> Option<usize> {
    let mut line = 0u32;
    let mut col = 0u32;
    for (idx, ch) in text.char_indices() {
        if line == position.line && col == position.character {
            return Some(idx);
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
    }
    (line == position.line && col == position.character).then_some(text.len())
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: "veneer-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let _ = self
            .client
            .log_message(MessageType::INFO, "Veneer LSP ready")
            .await;
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.document_updated(
            params.text_document.uri,
            params.text_document.text,
            false,
        )
        .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let text = params
            .content_changes
            .into_iter()
            .last()
            .map(|c| c.text)
            .unwrap_or_default();
        self.document_updated(params.text_document.uri, text, true).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Ok(path) = uri.to_file_path() {
            let mut pool = self.pool.lock().await;
            let project = pool.project_for_file(&path);
            project.overlay.file_changed(&path);
        }
        self.revisions.lock().await.remove(&uri);
    }

    /// Hover shows what the construct under the cursor lowered to.
    async fn hover(&self, params: HoverParams) -> tower_lsp::jsonrpc::Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Ok(path) = uri.to_file_path() else {
            return Ok(None);
        };

        let mut pool = self.pool.lock().await;
        let project = pool.project_for_file(&path);
        let config = Arc::clone(project.overlay.config());

        let (script, origin) = if config.is_template(&path) {
            (config.script_path_for(&path), Origin::Template)
        } else {
            (path.clone(), Origin::Script)
        };
        let Ok(module) = project.overlay.module_for(&script) else {
            return Ok(None);
        };

        let file = match origin {
            Origin::Script => &module.script,
            Origin::Template => match &module.template {
                Some(template) => template,
                None => return Ok(None),
            },
        };
        let Some(offset) = position_to_byte_offset(&file.contents, position) else {
            return Ok(None);
        };

        for span in module.spans() {
            if span.origin != origin {
                continue;
            }
            if let Some(node) = span.tree.innermost_by_original(offset) {
                let generated = module
                    .transformed_contents
                    .get(node.transformed.start..node.transformed.end)
                    .unwrap_or("");
                return Ok(Some(Hover {
                    contents: HoverContents::Scalar(MarkedString::LanguageString(
                        LanguageString {
                            language: "typescript".to_string(),
                            value: generated.to_string(),
                        },
                    )),
                    range: Some(Range {
                        start: byte_offset_to_position(&file.contents, node.original.start),
                        end: byte_offset_to_position(&file.contents, node.original.end),
                    }),
                }));
            }
        }
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))?;

    let (stdin, stdout) = (tokio::io::stdin(), tokio::io::stdout());
    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_offset_round_trips_through_positions() {
        let text = "first line\nsecond line\n";
        let offset = text.find("second").unwrap();
        let position = byte_offset_to_position(text, offset);
        assert_eq!(position, Position::new(1, 0));
        assert_eq!(position_to_byte_offset(text, position), Some(offset));
    }

    #[test]
    fn columns_count_utf16_code_units() {
        // U+1F4A1 is four UTF-8 bytes but two UTF-16 code units.
        let text = "a\u{1F4A1}b\n";
        let offset = text.find('b').unwrap();
        let position = byte_offset_to_position(text, offset);
        assert_eq!(position, Position::new(0, 3));
        assert_eq!(position_to_byte_offset(text, position), Some(offset));
    }

    #[test]
    fn position_past_the_document_is_rejected() {
        assert_eq!(position_to_byte_offset("one\n", Position::new(5, 0)), None);
    }

    #[test]
    fn zero_width_diagnostics_are_widened() {
        let d = MappedDiagnostic {
            kind: veneer_transform::DiagnosticKind::Host,
            path: PathBuf::from("a.ts"),
            range: veneer_syntax::Range::empty_at(2),
            message: "boom".to_string(),
            code: None,
        };
        let lsp = to_lsp_diagnostic(&d, "abcdef");
        assert_eq!(lsp.range.start, Position::new(0, 2));
        assert_eq!(lsp.range.end, Position::new(0, 3));
    }
}
