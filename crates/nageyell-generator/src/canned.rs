use async_trait::async_trait;
use nageyell_types::Result;

use crate::MessageGenerator;

/// Offline generator picking a fixed message by score tier.
#[derive(Debug, Clone, Default)]
pub struct CannedGenerator;

impl CannedGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn message_for(point: i64) -> &'static str {
        match point {
            i64::MIN..=100 => "素敵なステージをありがとう！これからも応援しています。",
            101..=400 => "心に響くパフォーマンスでした！次のライブも楽しみです。",
            401..=800 => "最高に盛り上がりました！元気をたくさんもらいました！",
            _ => "圧巻のステージ！一生忘れられない時間をありがとう！",
        }
    }
}

#[async_trait]
impl MessageGenerator for CannedGenerator {
    async fn generate(&self, _credential: &str, point: i64) -> Result<String> {
        Ok(Self::message_for(point).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tier_is_positive_and_short() {
        for point in [1, 100, 101, 400, 401, 800, 801, 1000] {
            let chars = CannedGenerator::message_for(point).chars().count();
            assert!((10..=80).contains(&chars), "point {point}: {chars} chars");
        }
    }

    #[test]
    fn higher_scores_change_the_message() {
        assert_ne!(
            CannedGenerator::message_for(1),
            CannedGenerator::message_for(1000)
        );
    }
}
