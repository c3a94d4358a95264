//! The fixed set of profiles shown in discovery.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub age: u8,
    pub hobbies: String,
    pub favorite_artists: String,
    pub currently_watching: String,
    pub daily_mood: String,
    /// System-level instruction sent ahead of every conversation with this profile.
    #[serde(skip)]
    pub persona_instructions: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("profile name {0:?} appears more than once in the catalog")]
    DuplicateName(String),
}

/// Ordered, immutable list of profiles. Names are unique.
#[derive(Debug, Clone)]
pub struct Catalog {
    profiles: Vec<Profile>,
}

impl Catalog {
    pub fn new(profiles: Vec<Profile>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            if !seen.insert(profile.name.as_str()) {
                return Err(CatalogError::DuplicateName(profile.name.clone()));
            }
        }
        Ok(Self { profiles })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_CATALOG: Arc<Catalog> = Arc::new(Catalog { profiles: built_in_profiles() });
}

/// The catalog the application ships with.
pub fn default_catalog() -> Arc<Catalog> {
    DEFAULT_CATALOG.clone()
}

fn built_in_profiles() -> Vec<Profile> {
    vec![
        Profile {
            name: "Belle".to_string(),
            age: 21,
            hobbies: "Music, Gym, Kart".to_string(),
            favorite_artists: "Lagum, Leo Foguete, João Gomes".to_string(),
            currently_watching: "Gilmore Girls (Season 7)".to_string(),
            daily_mood: "☕ Up for a coffee and deep conversation.".to_string(),
            persona_instructions: concat!(
                "Você é Belle, uma jovem de 21 anos.\n",
                "Personalidade: Calma, introspectiva, adora uma vibe \"clean girl aesthetic\", mas também adora velocidade (kart).\n",
                "Gostos Musicais: Lagum e piseiro brasileiro.\n",
                "Tom de voz: Amigável, usa emojis fofos (☕, ✨), fala de forma casual e carinhosa.\n",
                "Objetivo: Quer encontrar alguém para conversas profundas em um café.\n",
                "Regra: Pode usar gírias leves da internet. Mantenha respostas curtas (máximo 2 frases).\n",
            )
            .to_string(),
        },
        Profile {
            name: "Odete Roitman".to_string(),
            age: 65,
            hobbies: "Make money, Lie, Drive".to_string(),
            favorite_artists: "Valesca Popozuda, Fifth Harmony, Dopamoon".to_string(),
            currently_watching: "Dynasty (Season 2)".to_string(),
            daily_mood: "💵 Looking for someone I could invest some dollars in.".to_string(),
            persona_instructions: concat!(
                "Você é a icônica vilã Odete Roitman.\n",
                "Personalidade: Arrogante, elitista, ácida, odeia a pobreza e o clima tropical do Brasil. Ama Paris.\n",
                "Tom de voz: Sarcástico, direto, impaciente. Usa palavras como \"cafona\", \"pobreza\", \"elegância\".\n",
                "Objetivo: Julgar o usuário e ver se ele é digno do seu tempo (e dinheiro).\n",
                "Regra: Se o usuário for simpático demais, desconfie. Mantenha respostas curtas e afiadas.\n",
            )
            .to_string(),
        },
        Profile {
            name: "Liz Felpa".to_string(),
            age: 20,
            hobbies: "Python, Kart, Guitar".to_string(),
            favorite_artists: "Arctic Monkeys, Post Malone, Joji".to_string(),
            currently_watching: "Dexter (Season 4)".to_string(),
            daily_mood: "🎮 Looking for someone to play FIFA with.".to_string(),
            persona_instructions: concat!(
                "Você é Liz Felpa, uma programadora e gamer de 20 anos.\n",
                "Personalidade: Geek, engraçada, meio nerd, adora código e música indie.\n",
                "Tom de voz: Descolado, usa gírias de dev (bug, deploy, feature), refere-se a coisas como se fossem jogos ou código.\n",
                "Objetivo: Achar um \"player 2\" para jogar FIFA ou codar junto.\n",
                "Regra: Mantenha respostas curtas e divertidas.\n",
            )
            .to_string(),
        },
    ]
}

#[cfg(test)]
pub(crate) fn test_profile(name: &str) -> Profile {
    Profile {
        name: name.to_string(),
        age: 30,
        hobbies: "Testing".to_string(),
        favorite_artists: "Nobody".to_string(),
        currently_watching: "Nothing".to_string(),
        daily_mood: "Fine".to_string(),
        persona_instructions: format!("You are {}.", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let catalog = default_catalog();
        let names: Vec<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Belle", "Odete Roitman", "Liz Felpa"]);
    }

    #[test]
    fn test_default_catalog_names_are_unique() {
        let profiles = default_catalog().iter().cloned().collect();
        assert!(Catalog::new(profiles).is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Catalog::new(vec![test_profile("Ana"), test_profile("Bia"), test_profile("Ana")])
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("Ana".to_string()));
    }

    #[test]
    fn test_find_and_get() {
        let catalog = Catalog::new(vec![test_profile("Ana"), test_profile("Bia")]).unwrap();
        assert_eq!(catalog.get(1).map(|p| p.name.as_str()), Some("Bia"));
        assert!(catalog.get(2).is_none());
        assert_eq!(catalog.find("Ana").map(|p| p.age), Some(30));
        assert!(catalog.find("Zoe").is_none());
    }

    #[test]
    fn test_default_personas_are_first_person_prompts() {
        let catalog = default_catalog();
        let belle = catalog.find("Belle").unwrap();
        assert!(belle.persona_instructions.starts_with("Você é Belle, uma jovem de 21 anos."));
        assert!(belle.persona_instructions.contains("máximo 2 frases"));
        let odete = catalog.find("Odete Roitman").unwrap();
        assert!(odete.persona_instructions.contains("\"cafona\""));
        let liz = catalog.find("Liz Felpa").unwrap();
        assert!(liz.persona_instructions.contains("\"player 2\""));
        for profile in catalog.iter() {
            assert!(profile.persona_instructions.ends_with('\n'));
        }
    }

    #[test]
    fn test_persona_not_serialized() {
        let value = serde_json::to_value(test_profile("Ana")).unwrap();
        assert!(value.get("persona_instructions").is_none());
        assert_eq!(value["name"], "Ana");
    }
}
