use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::error;
use unic_langid::LanguageIdentifier;

/// Language used when the requested one is not available
pub const DEFAULT_LANGUAGE: &str = "it";

/// Fluent resources compiled into the binary
const RESOURCES: &[(&str, &str)] = &[
    ("it", include_str!("../locales/it/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager for ChefCode replies
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every bundled language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in RESOURCES {
            let bundle = Self::create_bundle(language, source)?;
            bundles.insert((*language).to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Manager without any bundle; every lookup reports a missing translation
    pub fn empty() -> Self {
        Self {
            bundles: HashMap::new(),
        }
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(language: &str, source: &str) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = language
            .parse()
            .map_err(|e| anyhow!("Invalid language identifier {language}: {e}"))?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Replies are plain text, no bidi isolation marks around arguments
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid Fluent resource for {language}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Conflicting Fluent messages for {language}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Whether a bundle exists for the language (region subtags ignored)
    pub fn supports(&self, language: &str) -> bool {
        self.bundles.contains_key(base_language(language))
    }

    /// Get a localized message in a specific language.
    ///
    /// Unsupported languages and keys missing from a language fall back to
    /// [`DEFAULT_LANGUAGE`].
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let requested = self.bundles.get(base_language(language));
        let fallback = self.bundles.get(DEFAULT_LANGUAGE);

        let found = [requested, fallback]
            .into_iter()
            .flatten()
            .find_map(|bundle| bundle.get_message(key).map(|msg| (bundle, msg)));

        let Some((bundle, msg)) = found else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = msg.value() else {
            return format!("Missing value for key: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, *value);
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            error!(key, ?errors, "Errors while formatting message");
        }
        value.into_owned()
    }

    /// Get a localized message in the default language
    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
    }
}

/// "it-IT" and "it_IT" both map to "it"
fn base_language(language: &str) -> &str {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
}

/// Global localization instance
static LOCALIZATION_MANAGER: LazyLock<LocalizationManager> = LazyLock::new(|| {
    LocalizationManager::new().unwrap_or_else(|e| {
        error!(error = %e, "Failed to load bundled translations");
        LocalizationManager::empty()
    })
});

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    &LOCALIZATION_MANAGER
}

/// Convenience function to get a localized message in the default language
pub fn t(key: &str) -> String {
    t_lang(key, DEFAULT_LANGUAGE)
}

/// Localized message in a given language
pub fn t_lang(key: &str, language: &str) -> String {
    get_localization_manager().get_message_in_language(key, language, None)
}

/// Localized message with arguments in a given language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: &str) -> String {
    let args_map: HashMap<&str, &str> = args.iter().copied().collect();
    get_localization_manager().get_message_in_language(key, language, Some(&args_map))
}
