//! # Assistant Module
//!
//! The rule-based half of the chat assistant. A few fixed Italian phrasings
//! are executed directly against the application state; everything else is
//! left to the chat-completion service, for which this module also builds
//! the system prompt describing the current kitchen.

use chrono::{Datelike, Local, NaiveDate, Weekday};
use tracing::{debug, info};

use crate::command_parser::{parse_command, validate_command};
use crate::command_patterns::ADD_PREFIX_REGEX;
use crate::inventory::{merge_item, total_value, InventoryItem, MergeOutcome};
use crate::localization::{t_args_lang, t_lang};
use crate::recipes::RecipeBook;
use crate::state::AppData;

/// Phrases that ask what can be cooked with the current inventory
const COOK_PHRASES: &[&str] = &["cosa posso cucinare", "che posso cucinare"];

/// Reply to a prompt handled without the chat-completion service
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub response: String,
    /// The application state was modified and clients should resync
    pub changed: bool,
}

/// Which assistant endpoint the system prompt is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Commands were already tried; the model only advises
    Smart,
    /// The model is also told which commands exist
    Classic,
}

/// Execute `prompt` if it is a known command.
///
/// Returns `None` when the prompt should go to the chat-completion service.
pub fn try_execute_command(prompt: &str, data: &mut AppData, lang: &str) -> Option<CommandReply> {
    let lowered = prompt.trim().to_lowercase();

    if ADD_PREFIX_REGEX.is_match(&lowered) {
        return Some(add_from_text(prompt, &mut data.inventory, lang));
    }

    if COOK_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return Some(suggest_from_inventory(&data.inventory, lang));
    }

    debug!("Prompt is not a command");
    None
}

fn add_from_text(prompt: &str, inventory: &mut Vec<InventoryItem>, lang: &str) -> CommandReply {
    let parsed = parse_command(prompt);

    let item = match validate_command(&parsed) {
        Ok(item) => item,
        Err(err) => {
            info!(error = %err, prompt, "Rejected add command");
            return CommandReply {
                response: t_lang(err.message_key(), lang),
                changed: false,
            };
        }
    };

    let quantity = format_number(parsed.quantity);
    let price = format_number(parsed.price);
    let outcome = merge_item(inventory, item);
    match outcome {
        MergeOutcome::Merged(index) => info!(
            item = %parsed.name,
            total = inventory[index].quantity,
            "Merged chat item into existing row"
        ),
        _ => info!(item = %parsed.name, row = outcome.index(), "Added chat item to inventory"),
    }

    let args = [
        ("quantity", quantity.as_str()),
        ("unit", parsed.unit.as_str()),
        ("name", parsed.name.as_str()),
        ("price", price.as_str()),
    ];
    let key = if parsed.price > 0.0 {
        "command-added-with-price"
    } else {
        "command-added"
    };

    CommandReply {
        response: t_args_lang(key, &args, lang),
        changed: true,
    }
}

fn suggest_from_inventory(inventory: &[InventoryItem], lang: &str) -> CommandReply {
    let response = if inventory.is_empty() {
        t_lang("cook-empty-inventory", lang)
    } else {
        let ingredients = inventory
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        t_args_lang("cook-suggestions", &[("ingredients", ingredients.as_str())], lang)
    };

    CommandReply {
        response,
        changed: false,
    }
}

/// `Inventario attuale: name (qty unit, €price), ...`
pub fn inventory_context(inventory: &[InventoryItem]) -> String {
    if inventory.is_empty() {
        return "Inventario vuoto".to_string();
    }
    let rows = inventory
        .iter()
        .map(|item| {
            format!(
                "{} ({} {}, €{})",
                item.name,
                format_number(item.quantity),
                item.unit,
                format_number(item.price)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Inventario attuale: {rows}. Valore totale: €{}",
        format_number(total_value(inventory))
    )
}

pub fn recipes_context(recipes: &RecipeBook) -> String {
    if recipes.is_empty() {
        return "Nessuna ricetta configurata".to_string();
    }
    let names = recipes.keys().cloned().collect::<Vec<_>>().join(", ");
    format!("Ricette disponibili: {names}")
}

/// System prompt for today's date
pub fn build_system_prompt(data: &AppData, kind: PromptKind) -> String {
    system_prompt_for(data, kind, Local::now().date_naive())
}

/// System prompt describing the kitchen as of `today`
pub fn system_prompt_for(data: &AppData, kind: PromptKind, today: NaiveDate) -> String {
    let capabilities = match kind {
        PromptKind::Smart => {
            "- Suggerire ricette basate sull'inventario disponibile\n\
             - Calcolare costi delle ricette\n\
             - Aiutare con la pianificazione della produzione\n\
             - Consigliare acquisti per completare ricette\n\
             - Analizzare la profittabilità dei piatti"
        }
        PromptKind::Classic => {
            "- Suggerire ricette basate sull'inventario\n\
             - Calcolare costi delle ricette\n\
             - Aiutare con la pianificazione della produzione\n\
             - Rispondere a domande sui cibi e sulla cucina\n\
             - Interpretare comandi vocali per aggiungere ingredienti\n\
             \n\
             COMANDI SPECIALI che puoi riconoscere:\n\
             - \"aggiungi [quantità] [unità] di [ingrediente]\"\n\
             - \"cosa posso cucinare?\"\n\
             - \"quanto costa fare [ricetta]?\"\n\
             - \"suggerisci qualcosa con [ingrediente]\""
        }
    };

    format!(
        "Sei l'assistente intelligente di ChefCode, una piattaforma di gestione ristorante.\n\
         \n\
         Oggi è {date}.\n\
         \n\
         STATO ATTUALE:\n\
         {inventory}\n\
         {recipes}\n\
         \n\
         CAPACITÀ:\n\
         {capabilities}\n\
         \n\
         Rispondi sempre in italiano, sii pratico e utile per un ambiente di ristorazione professionale.",
        date = italian_date(today),
        inventory = inventory_context(&data.inventory),
        recipes = recipes_context(&data.recipes),
    )
}

/// `lunedì 19 ottobre 2026`
pub fn italian_date(date: NaiveDate) -> String {
    const MONTHS: [&str; 12] = [
        "gennaio", "febbraio", "marzo", "aprile", "maggio", "giugno", "luglio", "agosto",
        "settembre", "ottobre", "novembre", "dicembre",
    ];
    let weekday = match date.weekday() {
        Weekday::Mon => "lunedì",
        Weekday::Tue => "martedì",
        Weekday::Wed => "mercoledì",
        Weekday::Thu => "giovedì",
        Weekday::Fri => "venerdì",
        Weekday::Sat => "sabato",
        Weekday::Sun => "domenica",
    };
    format!(
        "{weekday} {} {} {}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

/// Quantities and prices without float noise or a trailing `.0`
pub fn format_number(value: f64) -> String {
    let fixed = format!("{value:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
