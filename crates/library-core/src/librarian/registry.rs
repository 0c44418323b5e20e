//! `LibrarianRegistry`: the set of known librarians and the arbitration
//! logic that decides which one owns a given topic/content pair.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{LibraryError, Result};
use crate::librarian::definition::LibrarianDefinition;
use crate::librarian::glob;
use crate::provider::TextGenerationProvider;

/// A librarian's bid to own a piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    pub librarian_name: String,
    pub argument: String,
    pub confidence: f32,
}

/// Outcome of [`LibrarianRegistry::resolve_librarian`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOutcome {
    pub winner: String,
    pub reason: String,
    pub bids: Vec<Bid>,
}

/// Gap between the top two confidences above which the highest bidder wins
/// without consulting the arbitration prompt.
const DEFAULT_SELF_RESOLUTION_GAP: f32 = 0.3;

/// Extraction result shape a librarian's `extract` promises (spec §4.8).
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedMemory {
    pub text: String,
    pub topic: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "entryType", default = "default_entry_type")]
    pub entry_type: String,
}

fn default_entry_type() -> String {
    "note".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractResult {
    pub memories: Vec<ExtractedMemory>,
}

/// A relocation or merge a `reorganize`/`optimize` call proposes.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicMove {
    #[serde(rename = "volumeId")]
    pub volume_id: String,
    #[serde(rename = "newTopic")]
    pub new_topic: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicMerge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReorganizePlan {
    #[serde(default)]
    pub moves: Vec<TopicMove>,
    #[serde(default)]
    pub merges: Vec<TopicMerge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeResult {
    #[serde(default)]
    pub pruned: Vec<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub reorganization: ReorganizePlan,
}

/// The set of registered librarians plus the generator used for bidding,
/// arbitration, and specialist proposal on the `default` librarian's
/// behalf. Every librarian's operations dispatch through this same
/// generator: the ACP subprocess a librarian's [`crate::librarian::AcpSpec`]
/// would launch is an external collaborator this crate does not spawn.
pub struct LibrarianRegistry {
    definitions: RwLock<HashMap<String, LibrarianDefinition>>,
    generator: Arc<dyn TextGenerationProvider>,
    directory: Option<PathBuf>,
    self_resolution_gap: f32,
}

impl LibrarianRegistry {
    /// Construct a registry holding only the synthetic `default` librarian.
    pub fn new(generator: Arc<dyn TextGenerationProvider>) -> Self {
        let mut definitions = HashMap::new();
        definitions.insert("default".to_string(), LibrarianDefinition::default_librarian());
        Self {
            definitions: RwLock::new(definitions),
            generator,
            directory: None,
            self_resolution_gap: DEFAULT_SELF_RESOLUTION_GAP,
        }
    }

    /// Construct a registry that persists specialists under `directory` and
    /// loads any already there, skipping invalid files (logged, not fatal).
    pub async fn with_directory(generator: Arc<dyn TextGenerationProvider>, directory: PathBuf) -> Self {
        let registry = Self {
            directory: Some(directory),
            ..Self::new(generator)
        };
        registry.load_from_disk().await;
        registry
    }

    async fn load_from_disk(&self) {
        let Some(dir) = &self.directory else { return };
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, path = ?dir, "no librarians directory to load");
                return;
            }
        };
        let mut definitions = self.definitions.write().await;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(LibraryError::from)
                .and_then(|raw| serde_json::from_str::<LibrarianDefinition>(&raw).map_err(|e| LibraryError::Corrupt(e.to_string())))
                .and_then(|def| def.validate().map(|_| def))
            {
                Ok(def) => {
                    definitions.insert(def.name.clone(), def);
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "skipping invalid librarian definition");
                }
            }
        }
    }

    /// Register (or replace) a librarian, persisting it to disk if this
    /// registry has a directory.
    pub async fn register(&self, def: LibrarianDefinition) -> Result<()> {
        def.validate()?;
        if let Some(dir) = &self.directory {
            persist(dir, &def)?;
        }
        self.definitions.write().await.insert(def.name.clone(), def);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<LibrarianDefinition> {
        self.definitions.read().await.get(name).cloned()
    }

    pub async fn all(&self) -> Vec<LibrarianDefinition> {
        let mut defs: Vec<_> = self.definitions.read().await.values().cloned().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Specialists whose topic glob matches `topic`. `default` is never a
    /// candidate here — spec §4.8 treats it as the fallback, not a bidder.
    async fn matching(&self, topic: &str) -> Vec<LibrarianDefinition> {
        self.definitions
            .read()
            .await
            .values()
            .filter(|def| def.name != "default" && glob::any_matches(&def.topics, topic))
            .cloned()
            .collect()
    }

    /// Decide which librarian owns `content` tagged with `topic`.
    pub async fn resolve_librarian(&self, topic: &str, content: &str) -> Result<ResolveOutcome> {
        let mut candidates = self.matching(topic).await;
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        match candidates.len() {
            0 => Ok(ResolveOutcome {
                winner: "default".to_string(),
                reason: "no librarian's topic glob matched; default owns everything".to_string(),
                bids: Vec::new(),
            }),
            1 => Ok(ResolveOutcome {
                winner: candidates[0].name.clone(),
                reason: "exactly one librarian's topic glob matched".to_string(),
                bids: Vec::new(),
            }),
            _ => self.arbitrate(candidates, topic, content).await,
        }
    }

    async fn arbitrate(
        &self,
        candidates: Vec<LibrarianDefinition>,
        topic: &str,
        content: &str,
    ) -> Result<ResolveOutcome> {
        let mut bids = Vec::with_capacity(candidates.len());
        for def in &candidates {
            bids.push(self.bid(def, topic, content).await);
        }
        bids.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

        let top = bids[0].clone();
        let gap = if bids.len() > 1 { top.confidence - bids[1].confidence } else { top.confidence };

        if gap > self.self_resolution_gap {
            return Ok(ResolveOutcome {
                winner: top.librarian_name.clone(),
                reason: format!(
                    "confidence gap {gap:.2} exceeds self-resolution threshold {:.2}",
                    self.self_resolution_gap
                ),
                bids,
            });
        }

        let names: Vec<&str> = candidates.iter().map(|d| d.name.as_str()).collect();
        let preview: String = content.chars().take(500).collect();
        let prompt = arbitration_prompt(&names, topic, &preview, &bids);

        match self.generator.generate(&prompt).await {
            Ok(raw) => match parse_arbitration(&raw, &names) {
                Some((winner, reason)) => Ok(ResolveOutcome { winner, reason, bids }),
                None => Ok(fallback_to_highest_bidder(bids, "arbitration response was unparseable or named an unknown librarian")),
            },
            Err(e) => {
                warn!(error = %e, "arbitration prompt failed, falling back to highest bidder");
                Ok(fallback_to_highest_bidder(bids, "arbitration prompt failed"))
            }
        }
    }

    /// Run `extract` on a turn of conversation text, proposing zero or more
    /// memories to add.
    pub async fn extract(&self, turn: &str) -> Result<ExtractResult> {
        let prompt = format!(
            "Extract zero or more memories worth storing from this turn of conversation.\n\
             Turn: {turn}\n\n\
             Reply with JSON: {{\"memories\": [{{\"text\": \"<string>\", \"topic\": \"<string>\", \
             \"tags\": [\"<string>\", ...], \"entryType\": \"fact\"|\"note\"|\"compendium\"}}]}}"
        );
        let raw = self.generate(&prompt).await?;
        serde_json::from_str(&raw).map_err(|e| LibraryError::Validation(format!("unparseable extract response: {e}")))
    }

    /// Summarize `volumes` (id, text pairs) belonging to `topic` into a
    /// single compendium text.
    pub async fn summarize(&self, volumes: &[(String, String)], topic: &str) -> Result<String> {
        let mut prompt = format!("Summarize the following volumes under topic \"{topic}\" into one cohesive passage:\n\n");
        for (id, text) in volumes {
            prompt.push_str(&format!("[{id}] {text}\n"));
        }
        self.generate(&prompt).await
    }

    /// Propose a reorganization (moves/merges) for `volumes` under `topic`.
    pub async fn reorganize(&self, topic: &str, volumes: &[(String, String)]) -> Result<ReorganizePlan> {
        let mut prompt = format!(
            "Topic \"{topic}\" has grown large. Propose moves (to a more specific sub-topic) or merges \
             (into a sibling topic) for these volumes:\n\n"
        );
        for (id, text) in volumes {
            prompt.push_str(&format!("[{id}] {text}\n"));
        }
        prompt.push_str(
            "\nReply with JSON: {\"moves\": [{\"volumeId\": \"<id>\", \"newTopic\": \"<topic>\"}], \
             \"merges\": [{\"source\": \"<topic>\", \"target\": \"<topic>\"}]}",
        );
        let raw = self.generate(&prompt).await?;
        serde_json::from_str(&raw).map_err(|e| LibraryError::Validation(format!("unparseable reorganize response: {e}")))
    }

    /// Ask for pruning, an optional summary, and a reorganization plan in
    /// one pass, as the Optimization job requires.
    pub async fn optimize(&self, topic: &str, volumes: &[(String, String)]) -> Result<OptimizeResult> {
        let mut prompt = format!(
            "Optimize topic \"{topic}\": identify stale/redundant volume ids to prune, optionally produce \
             a summary of what was pruned, and propose a reorganization. Volumes:\n\n"
        );
        for (id, text) in volumes {
            prompt.push_str(&format!("[{id}] {text}\n"));
        }
        prompt.push_str(
            "\nReply with JSON: {\"pruned\": [\"<id>\"], \"summary\": \"<string>\"?, \
             \"reorganization\": {\"moves\": [...], \"merges\": [...]}}",
        );
        let raw = self.generate(&prompt).await?;
        serde_json::from_str(&raw).map_err(|e| LibraryError::Validation(format!("unparseable optimize response: {e}")))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generator
            .generate(prompt)
            .await
            .map_err(|e| LibraryError::ProviderFailed { provider: "text-generator".to_string(), cause: e.to_string() })
    }

    async fn bid(&self, def: &LibrarianDefinition, topic: &str, content: &str) -> Bid {
        let preview: String = content.chars().take(500).collect();
        let prompt = format!(
            "You are the librarian \"{}\". Purpose: {}. Description: {}.\n\
             A piece of content tagged with topic \"{}\" needs an owner.\n\
             Content preview: {}\n\
             Reply with JSON: {{\"librarianName\": \"{}\", \"argument\": \"<why you should own this>\", \"confidence\": <0..1>}}",
            def.name, def.purpose, def.description, topic, preview, def.name
        );
        match self.generator.generate(&prompt).await {
            Ok(raw) => parse_bid(&raw, &def.name).unwrap_or_else(|| Bid {
                librarian_name: def.name.clone(),
                argument: "no parseable bid; defaulted to zero confidence".to_string(),
                confidence: 0.0,
            }),
            Err(e) => Bid {
                librarian_name: def.name.clone(),
                argument: format!("bid request failed: {e}"),
                confidence: 0.0,
            },
        }
    }

    /// Ask whether a specialist for `topic` is warranted and, if so,
    /// propose and register one.
    pub async fn spawn_specialist(&self, topic: &str, volume_count: usize) -> Result<LibrarianDefinition> {
        let should_spawn_prompt = format!(
            "Topic \"{topic}\" now has {volume_count} volumes under the default librarian.\n\
             Reply with JSON: {{\"shouldSpawn\": <bool>, \"reason\": \"<string>\"}}"
        );
        let raw = self
            .generator
            .generate(&should_spawn_prompt)
            .await
            .map_err(|e| LibraryError::ProviderFailed { provider: "text-generator".to_string(), cause: e.to_string() })?;
        let decision: Value = serde_json::from_str(&raw)
            .map_err(|e| LibraryError::SpecialistNotNeeded(format!("unparseable shouldSpawn response: {e}")))?;
        let should_spawn = decision.get("shouldSpawn").and_then(Value::as_bool).unwrap_or(false);
        if !should_spawn {
            let reason = decision
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("generator declined")
                .to_string();
            return Err(LibraryError::SpecialistNotNeeded(reason));
        }

        let proposal_prompt = format!(
            "Propose a LibrarianDefinition JSON for a specialist over topic \"{topic}\".\n\
             Schema: {{\"name\": \"<kebab-case>\", \"description\": \"<string>\", \"purpose\": \"<string>\", \
             \"topics\": [\"<glob>\", ...], \"permissions\": {{\"add\": bool, \"delete\": bool, \"reorganize\": bool}}, \
             \"thresholds\": {{\"topicComplexity\": <int>, \"escalateAt\": <int>}}}}"
        );
        let raw = self
            .generator
            .generate(&proposal_prompt)
            .await
            .map_err(|e| LibraryError::ProviderFailed { provider: "text-generator".to_string(), cause: e.to_string() })?;
        let def: LibrarianDefinition =
            serde_json::from_str(&raw).map_err(|e| LibraryError::Validation(format!("unparseable librarian proposal: {e}")))?;
        def.validate()?;
        self.register(def.clone()).await?;
        Ok(def)
    }
}

fn persist(dir: &Path, def: &LibrarianDefinition) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", def.name));
    let json = serde_json::to_string_pretty(def).map_err(|e| LibraryError::Corrupt(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

fn arbitration_prompt(names: &[&str], topic: &str, preview: &str, bids: &[Bid]) -> String {
    let mut prompt = format!(
        "Candidates {names:?} both/all claim topic \"{topic}\". Content preview: {preview}\n\nBids:\n"
    );
    for bid in bids {
        prompt.push_str(&format!(
            "- {}: confidence {:.2}, argument: {}\n",
            bid.librarian_name, bid.confidence, bid.argument
        ));
    }
    prompt.push_str("\nReply with JSON: {\"winner\": \"<name>\", \"reason\": \"<string>\"}");
    prompt
}

fn parse_bid(raw: &str, expected_name: &str) -> Option<Bid> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let confidence = value.get("confidence").and_then(Value::as_f64)? as f32;
    let argument = value.get("argument").and_then(Value::as_str).unwrap_or("").to_string();
    let name = value
        .get("librarianName")
        .and_then(Value::as_str)
        .unwrap_or(expected_name)
        .to_string();
    Some(Bid { librarian_name: name, argument, confidence: confidence.clamp(0.0, 1.0) })
}

fn parse_arbitration(raw: &str, candidates: &[&str]) -> Option<(String, String)> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let winner = value.get("winner").and_then(Value::as_str)?;
    if !candidates.contains(&winner) {
        return None;
    }
    let reason = value.get("reason").and_then(Value::as_str).unwrap_or("arbitrated").to_string();
    Some((winner.to_string(), reason))
}

fn fallback_to_highest_bidder(bids: Vec<Bid>, reason: &str) -> ResolveOutcome {
    let winner = bids[0].librarian_name.clone();
    ResolveOutcome { winner, reason: reason.to_string(), bids }
}
