use futures::future::BoxFuture;
use redis::{AsyncCommands, aio::ConnectionManager};

use super::error::RedisDaoError;
use crate::dao::{board::ScoreBackend, storage::StorageResult};

const LEADERBOARD_KEY_PREFIX: &str = "quiz:";
const LEADERBOARD_KEY_SUFFIX: &str = ":leaderboard";

/// Key of the sorted set holding a quiz leaderboard: `quiz:{quizId}:leaderboard`.
pub fn leaderboard_key(quiz: &str) -> String {
    format!("{LEADERBOARD_KEY_PREFIX}{quiz}{LEADERBOARD_KEY_SUFFIX}")
}

/// Sorted-set leaderboard over the shared Redis datastore.
///
/// Every mutation maps to a single atomic command (ZADD NX, ZINCRBY), so
/// concurrent instances never need coordination beyond Redis itself.
#[derive(Clone)]
pub struct RedisScoreBoard {
    conn: ConnectionManager,
}

impl RedisScoreBoard {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn command_error(command: &'static str) -> impl FnOnce(redis::RedisError) -> RedisDaoError {
    move |source| RedisDaoError::Command { command, source }
}

impl ScoreBackend for RedisScoreBoard {
    fn add_if_absent(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        let user = user.to_owned();
        Box::pin(async move {
            // ZADD key NX 0 member
            let added: i64 = redis::cmd("ZADD")
                .arg(&key)
                .arg("NX")
                .arg(0i64)
                .arg(&user)
                .query_async(&mut conn)
                .await
                .map_err(command_error("ZADD"))?;
            Ok(added > 0)
        })
    }

    fn increment_score(
        &self,
        quiz: &str,
        user: &str,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<i64>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        let user = user.to_owned();
        Box::pin(async move {
            let new_score: i64 = conn
                .zincr(&key, &user, delta)
                .await
                .map_err(command_error("ZINCRBY"))?;
            Ok(new_score)
        })
    }

    fn top_n(&self, quiz: &str, n: usize) -> BoxFuture<'static, StorageResult<Vec<(String, i64)>>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        Box::pin(async move {
            if n == 0 {
                return Ok(Vec::new());
            }
            let rows: Vec<(String, i64)> = conn
                .zrevrange_withscores(&key, 0, n as isize - 1)
                .await
                .map_err(command_error("ZREVRANGE"))?;
            Ok(rows)
        })
    }

    fn score(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<Option<i64>>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        let user = user.to_owned();
        Box::pin(async move {
            let score: Option<i64> = conn
                .zscore(&key, &user)
                .await
                .map_err(command_error("ZSCORE"))?;
            Ok(score)
        })
    }

    fn rank(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        let user = user.to_owned();
        Box::pin(async move {
            let rank: Option<u64> = redis::cmd("ZREVRANK")
                .arg(&key)
                .arg(&user)
                .query_async(&mut conn)
                .await
                .map_err(command_error("ZREVRANK"))?;
            Ok(rank)
        })
    }

    fn member_count(&self, quiz: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        Box::pin(async move {
            let count: u64 = conn.zcard(&key).await.map_err(command_error("ZCARD"))?;
            Ok(count)
        })
    }

    fn remove_member(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        let user = user.to_owned();
        Box::pin(async move {
            let removed: i64 = conn.zrem(&key, &user).await.map_err(command_error("ZREM"))?;
            Ok(removed > 0)
        })
    }

    fn delete_board(&self, quiz: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        let key = leaderboard_key(quiz);
        Box::pin(async move {
            let deleted: i64 = conn.del(&key).await.map_err(command_error("DEL"))?;
            Ok(deleted > 0)
        })
    }

    fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(command_error("PING"))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_key_matches_contract() {
        assert_eq!(leaderboard_key("q1"), "quiz:q1:leaderboard");
        assert_eq!(leaderboard_key("math-101"), "quiz:math-101:leaderboard");
    }
}
