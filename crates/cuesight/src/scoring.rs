//! Scores and outcomes of the three table games, from ball and target positions.

use crate::core::PixelPoint;
use crate::table::{ObjectColor, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Positions = BTreeMap<ObjectColor, PixelPoint>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("{kind:?} {label:?} was not detected")]
    MissingObject { kind: ObjectKind, label: ObjectColor },
}

/// `true` when `ball` lies within `radius` of `target`, boundary included.
pub fn in_zone(ball: PixelPoint, target: PixelPoint, radius: u32) -> bool {
    let dx = u128::from(ball.x.abs_diff(target.x));
    let dy = u128::from(ball.y.abs_diff(target.y));
    let r = u128::from(radius);
    dx * dx + dy * dy <= r * r
}

/// Manhattan distance, saturating at `u32::MAX`; lower is better.
pub fn score(ball: PixelPoint, target: PixelPoint) -> u32 {
    ball.x
        .abs_diff(target.x)
        .saturating_add(ball.y.abs_diff(target.y))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// White ball into the brown zone.
    Line,
    /// White ball into the brown zone without moving the yellow ball.
    Obstacle,
    /// White ball into brown and yellow ball into cyan, touching only the white.
    Contact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Won,
    Missed,
    YellowMoved,
    WhiteOutOfTarget,
    YellowOutOfTarget,
    BothOutOfTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub game: GameKind,
    pub score: f64,
    pub verdict: Verdict,
}

impl RoundOutcome {
    pub fn won(&self) -> bool {
        self.verdict == Verdict::Won
    }
}

fn ball(balls: &Positions, label: ObjectColor) -> Result<PixelPoint, ScoringError> {
    balls.get(&label).copied().ok_or(ScoringError::MissingObject {
        kind: ObjectKind::Ball,
        label,
    })
}

fn target(targets: &Positions, label: ObjectColor) -> Result<PixelPoint, ScoringError> {
    targets.get(&label).copied().ok_or(ScoringError::MissingObject {
        kind: ObjectKind::Target,
        label,
    })
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::Line, GameKind::Obstacle, GameKind::Contact];

    /// Menu number, starting at 1.
    pub fn number(self) -> u8 {
        match self {
            GameKind::Line => 1,
            GameKind::Obstacle => 2,
            GameKind::Contact => 3,
        }
    }

    /// Balls that must start on their white/yellow placement marks.
    pub fn placed_balls(self) -> &'static [ObjectColor] {
        match self {
            GameKind::Line => &[ObjectColor::White],
            GameKind::Obstacle | GameKind::Contact => &[ObjectColor::White, ObjectColor::Yellow],
        }
    }

    /// Balls not yet within `placement_radius` of their placement mark.
    pub fn misplaced(
        self,
        balls: &Positions,
        targets: &Positions,
        placement_radius: u32,
    ) -> Result<Vec<ObjectColor>, ScoringError> {
        let mut out = Vec::new();
        for &label in self.placed_balls() {
            if !in_zone(ball(balls, label)?, target(targets, label)?, placement_radius) {
                out.push(label);
            }
        }
        Ok(out)
    }

    /// Judge the final ball positions.
    pub fn evaluate(
        self,
        balls: &Positions,
        targets: &Positions,
        zone_radius: u32,
        placement_radius: u32,
    ) -> Result<RoundOutcome, ScoringError> {
        use ObjectColor::{Brown, Cyan, White, Yellow};

        let white = ball(balls, White)?;
        let brown = target(targets, Brown)?;
        let (score_value, verdict) = match self {
            GameKind::Line => {
                let won = in_zone(white, brown, zone_radius);
                (score(white, brown) as f64, if won { Verdict::Won } else { Verdict::Missed })
            }
            GameKind::Obstacle => {
                let yellow = ball(balls, Yellow)?;
                let mark = target(targets, Yellow)?;
                if !in_zone(yellow, mark, placement_radius) {
                    (2.0 * score(yellow, mark) as f64, Verdict::YellowMoved)
                } else if in_zone(white, brown, zone_radius) {
                    (score(white, brown) as f64, Verdict::Won)
                } else {
                    (score(white, brown) as f64, Verdict::Missed)
                }
            }
            GameKind::Contact => {
                let yellow = ball(balls, Yellow)?;
                let cyan = target(targets, Cyan)?;
                let total = score(white, brown) as f64 + score(yellow, cyan) as f64;
                // The white ball is judged against the placement radius here.
                let white_in = in_zone(white, brown, placement_radius);
                let yellow_in = in_zone(yellow, cyan, zone_radius);
                let verdict = match (white_in, yellow_in) {
                    (true, true) => Verdict::Won,
                    (true, false) => Verdict::YellowOutOfTarget,
                    (false, true) => Verdict::WhiteOutOfTarget,
                    (false, false) => Verdict::BothOutOfTarget,
                };
                (total / 2.0, verdict)
            }
        };
        log::info!(
            "game {}: {:?} with score {}",
            self.number(),
            verdict,
            score_value
        );
        Ok(RoundOutcome {
            game: self,
            score: score_value,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> PixelPoint {
        PixelPoint::new(x, y)
    }

    fn targets() -> Positions {
        Positions::from([
            (ObjectColor::White, p(100, 100)),
            (ObjectColor::Yellow, p(300, 100)),
            (ObjectColor::Brown, p(600, 400)),
            (ObjectColor::Cyan, p(900, 200)),
        ])
    }

    #[test]
    fn zone_boundary_is_inclusive() {
        assert!(in_zone(p(3, 4), p(0, 0), 5));
        assert!(!in_zone(p(3, 5), p(0, 0), 5));
        assert!(in_zone(p(7, 7), p(7, 7), 0));
    }

    #[test]
    fn score_is_manhattan() {
        assert_eq!(score(p(10, 20), p(13, 16)), 7);
        assert_eq!(score(p(-5, 0), p(5, 0)), 10);
    }

    #[test]
    fn far_apart_points_do_not_overflow() {
        let (lo, hi) = (p(i32::MIN, i32::MIN), p(i32::MAX, i32::MAX));
        assert!(!in_zone(lo, hi, u32::MAX));
        assert!(in_zone(p(i32::MIN, 0), p(i32::MIN + 3, 4), 5));
        assert!(in_zone(p(i32::MAX, 0), p(0, 0), u32::MAX));
        assert_eq!(score(lo, hi), u32::MAX);
        assert_eq!(score(p(i32::MIN, 0), p(i32::MAX, 0)), u32::MAX);
    }

    #[test]
    fn line_game() {
        let balls = Positions::from([(ObjectColor::White, p(610, 420))]);
        let out = GameKind::Line.evaluate(&balls, &targets(), 50, 100).unwrap();
        assert!(out.won());
        assert_eq!(out.score, 30.0);

        let balls = Positions::from([(ObjectColor::White, p(700, 400))]);
        let out = GameKind::Line.evaluate(&balls, &targets(), 50, 100).unwrap();
        assert_eq!(out.verdict, Verdict::Missed);
        assert_eq!(out.score, 100.0);
    }

    #[test]
    fn obstacle_game_doubles_the_yellow_drift() {
        let balls = Positions::from([
            (ObjectColor::White, p(600, 400)),
            (ObjectColor::Yellow, p(450, 100)),
        ]);
        let out = GameKind::Obstacle.evaluate(&balls, &targets(), 50, 100).unwrap();
        assert_eq!(out.verdict, Verdict::YellowMoved);
        assert_eq!(out.score, 300.0);

        let balls = Positions::from([
            (ObjectColor::White, p(605, 400)),
            (ObjectColor::Yellow, p(310, 100)),
        ]);
        let out = GameKind::Obstacle.evaluate(&balls, &targets(), 50, 100).unwrap();
        assert!(out.won());
        assert_eq!(out.score, 5.0);
    }

    #[test]
    fn contact_game_averages_both_scores() {
        let balls = Positions::from([
            (ObjectColor::White, p(660, 400)),
            (ObjectColor::Yellow, p(900, 230)),
        ]);
        // White is 60 away: outside a 50 zone but inside the 100 placement radius.
        let out = GameKind::Contact.evaluate(&balls, &targets(), 50, 100).unwrap();
        assert!(out.won());
        assert_eq!(out.score, 45.0);

        let balls = Positions::from([
            (ObjectColor::White, p(600, 400)),
            (ObjectColor::Yellow, p(900, 300)),
        ]);
        let out = GameKind::Contact.evaluate(&balls, &targets(), 50, 100).unwrap();
        assert_eq!(out.verdict, Verdict::YellowOutOfTarget);
        assert_eq!(out.score, 50.0);
    }

    #[test]
    fn missing_objects_are_reported() {
        let err = GameKind::Line
            .evaluate(&Positions::new(), &targets(), 50, 100)
            .unwrap_err();
        assert_eq!(
            err,
            ScoringError::MissingObject {
                kind: ObjectKind::Ball,
                label: ObjectColor::White
            }
        );
        let balls = Positions::from([(ObjectColor::White, p(0, 0))]);
        let err = GameKind::Contact.evaluate(&balls, &targets(), 50, 100).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::MissingObject {
                label: ObjectColor::Yellow,
                ..
            }
        ));
    }

    #[test]
    fn placement_check() {
        let balls = Positions::from([
            (ObjectColor::White, p(150, 100)),
            (ObjectColor::Yellow, p(500, 100)),
        ]);
        assert!(GameKind::Line.misplaced(&balls, &targets(), 100).unwrap().is_empty());
        assert_eq!(
            GameKind::Obstacle.misplaced(&balls, &targets(), 100).unwrap(),
            vec![ObjectColor::Yellow]
        );
    }
}
