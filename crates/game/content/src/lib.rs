//! Built-in fixture content.
//!
//! `Café Days` is a deliberately small but complete game package covering
//! every subsystem the runtime exercises: meters with caps and decay,
//! gates with guards, schedules, a multi-slot wardrobe, outfits, a
//! modifier with entry/exit effects and a gate clamp, nodes with
//! transitions, all three event trigger kinds, an arc with an unlock, and
//! zone travel with entry/exit rules. Integration tests and demos load it
//! in place of an externally validated package.

use plotplay_core::Game;

const CAFE_JSON: &str = include_str!("../assets/cafe.json");

/// The café fixture game.
///
/// Panics on malformed embedded JSON, which is a build defect, not a
/// runtime condition.
pub fn cafe_game() -> Game {
    serde_json::from_str(CAFE_JSON).expect("embedded cafe.json is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_parses_and_indexes() {
        let game = cafe_game();
        assert_eq!(game.meta.id, "cafe_days");
        assert!(game.character("emma").is_some());
        assert!(game.location("cafe_patio").is_some());
        assert!(game.node("day_hub").is_some());
        assert!(game.outfit("date_out").is_some());
        assert!(game.modifier("drunk").is_some());
        assert!(game.arc("emma_romance").is_some());
        assert_eq!(game.meter("emma", "trust").map(|m| m.max), Some(100.0));
        // Character override shadows the game-level money meter.
        assert_eq!(game.meter("vendor", "money").map(|m| m.default), Some(200.0));
    }

    #[test]
    fn fixture_cross_references_hold() {
        let game = cafe_game();
        for location in &game.locations {
            assert!(game.zone(&location.zone).is_some(), "zone of {}", location.id);
            for conn in &location.connections {
                assert!(game.location(&conn.to).is_some(), "edge {}→{}", location.id, conn.to);
            }
        }
        for outfit in &game.outfits {
            for item in &outfit.items {
                assert!(game.clothing_item(item).is_some(), "outfit item {item}");
            }
        }
        for character in &game.characters {
            for rule in &character.schedule {
                assert!(game.location(&rule.location).is_some(), "schedule {}", rule.location);
            }
        }
    }
}
