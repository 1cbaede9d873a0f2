//! Acceptance rules for client-reported positions
//!
//! Players report their own positions and the server relays them. Whether a
//! report is believed is isolated behind [`PositionPolicy`] so a stricter rule
//! can replace the cooperative default without touching the relay path.

use shared::Vec2;

pub trait PositionPolicy: Send + Sync {
    /// Returns the position to store and relay, or `None` to drop the report.
    fn accept(&self, session_id: u32, reported: Vec2) -> Option<Vec2>;
}

/// Believes every report as sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustClient;

impl PositionPolicy for TrustClient {
    fn accept(&self, _session_id: u32, reported: Vec2) -> Option<Vec2> {
        Some(reported)
    }
}

/// Keeps reports inside the arena, and drops reports that are not finite.
#[derive(Debug, Clone, Copy)]
pub struct ClampToArena {
    pub width: f32,
    pub height: f32,
}

impl PositionPolicy for ClampToArena {
    fn accept(&self, _session_id: u32, reported: Vec2) -> Option<Vec2> {
        if !reported.x.is_finite() || !reported.y.is_finite() {
            return None;
        }
        Some(reported.clamp_to_arena(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_client_accepts_anything() {
        let reported = Vec2::new(-5000.0, 12.0);
        assert_eq!(TrustClient.accept(1, reported), Some(reported));
    }

    #[test]
    fn test_clamp_to_arena() {
        let policy = ClampToArena {
            width: 800.0,
            height: 600.0,
        };
        assert_eq!(
            policy.accept(1, Vec2::new(900.0, -3.0)),
            Some(Vec2::new(800.0, 0.0))
        );
        assert_eq!(
            policy.accept(1, Vec2::new(10.0, 20.0)),
            Some(Vec2::new(10.0, 20.0))
        );
        assert_eq!(policy.accept(1, Vec2::new(f32::NAN, 0.0)), None);
    }

    #[test]
    fn test_policy_as_trait_object() {
        let policies: Vec<Box<dyn PositionPolicy>> = vec![
            Box::new(TrustClient),
            Box::new(ClampToArena {
                width: 100.0,
                height: 100.0,
            }),
        ];
        let accepted: Vec<_> = policies
            .iter()
            .map(|p| p.accept(1, Vec2::new(50.0, 50.0)))
            .collect();
        assert_eq!(accepted, vec![Some(Vec2::new(50.0, 50.0)); 2]);
    }
}
