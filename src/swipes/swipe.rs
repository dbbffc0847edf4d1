use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{db, notify::{Rooms, ServerEvent}, users, AppError, AppResult};

use super::Direction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwipeOutcome {
    /// The pair is matched after this swipe.
    pub matched: bool,
    /// This swipe is the one that created the match.
    pub newly_matched: bool,
}

/// Records `actor_id`'s swipe on `target_id`.
///
/// A right swipe on someone who already swiped right on the actor creates the
/// match and pushes `match_found`, with the actor's profile, to the target's
/// room. The actor learns about the match from the return value.
pub async fn swipe(
    db_pool: &SqlitePool,
    rooms: &Rooms,
    actor_id: Uuid,
    target_id: Uuid,
    direction: Direction,
) -> AppResult<SwipeOutcome> {
    if actor_id == target_id {
        return Err(AppError::invalid("cannot swipe on yourself"));
    }

    let actor = users::profile(db_pool, actor_id).await?;
    if !users::exists(db_pool, target_id).await? {
        return Err(AppError::NotFound("target user"));
    }

    if direction == Direction::Left {
        tracing::debug!(actor = %actor_id, target = %target_id, "passed");
        return Ok(SwipeOutcome::default());
    }

    let now = db::now_millis();
    let mut tx = db_pool.begin().await?;

    // Write before reading: the first write takes SQLite's write lock, so two
    // opposite swipes on the same pair run one after the other and the second
    // always sees the first one's row.
    sqlx::query("INSERT OR IGNORE INTO swipes (actor_id,target_id,created_at) VALUES (?,?,?)")
        .bind(actor_id)
        .bind(target_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let reciprocal: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM swipes WHERE actor_id = ? AND target_id = ?")
        .bind(target_id)
        .bind(actor_id)
        .fetch_optional(&mut *tx)
        .await?;

    if reciprocal.is_none() {
        tx.commit().await?;
        tracing::info!(actor = %actor_id, target = %target_id, "right swipe recorded");
        return Ok(SwipeOutcome::default());
    }

    let (user_a, user_b) = db::pair_key(actor_id, target_id);
    let created = sqlx::query("INSERT OR IGNORE INTO matches (user_a,user_b,created_at) VALUES (?,?,?)")
        .bind(user_a)
        .bind(user_b)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        == 1;
    tx.commit().await?;

    if created {
        let delivered = rooms.publish(target_id, &ServerEvent::MatchFound(actor));
        tracing::info!(actor = %actor_id, target = %target_id, delivered, "match formed");
    } else {
        tracing::debug!(actor = %actor_id, target = %target_id, "already matched");
    }

    Ok(SwipeOutcome {
        matched: true,
        newly_matched: created,
    })
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{db::memory_pool, users::tests::user};

    #[tokio::test]
    async fn left_swipe_changes_nothing() {
        let db_pool = memory_pool().await;
        let rooms = Rooms::new();
        let alice = user(&db_pool, "alice").await;
        let bob = user(&db_pool, "bob").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _m = rooms.join(bob.id, tx);

        // bob already likes alice; a left swipe from alice still must not match
        swipe(&db_pool, &rooms, bob.id, alice.id, Direction::Right).await.unwrap();
        let outcome = swipe(&db_pool, &rooms, alice.id, bob.id, Direction::Left).await.unwrap();

        assert_eq!(outcome, SwipeOutcome::default());
        assert!(users::swiped_right(&db_pool, alice.id).await.unwrap().is_empty());
        assert!(!users::is_matched(&db_pool, alice.id, bob.id).await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn mutual_right_swipes_match_and_notify_first_swiper() {
        let db_pool = memory_pool().await;
        let rooms = Rooms::new();
        let a = user(&db_pool, "a").await;
        let b = user(&db_pool, "b").await;
        let (tx, mut a_events) = mpsc::unbounded_channel();
        let _m = rooms.join(a.id, tx);

        let first = swipe(&db_pool, &rooms, a.id, b.id, Direction::Right).await.unwrap();
        assert!(!first.matched);
        assert_eq!(users::swiped_right(&db_pool, a.id).await.unwrap(), vec![b.id]);
        assert!(a_events.try_recv().is_err());

        let second = swipe(&db_pool, &rooms, b.id, a.id, Direction::Right).await.unwrap();
        assert!(second.matched && second.newly_matched);

        assert_eq!(a_events.try_recv().unwrap(), ServerEvent::MatchFound(b.clone()));
        assert!(a_events.try_recv().is_err());

        let a_matches = users::matches_of(&db_pool, a.id).await.unwrap();
        let b_matches = users::matches_of(&db_pool, b.id).await.unwrap();
        assert_eq!(a_matches.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id]);
        assert_eq!(b_matches.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a.id]);
    }

    #[tokio::test]
    async fn repeated_right_swipes_are_idempotent() {
        let db_pool = memory_pool().await;
        let rooms = Rooms::new();
        let a = user(&db_pool, "a").await;
        let b = user(&db_pool, "b").await;
        let (tx, mut a_events) = mpsc::unbounded_channel();
        let _m = rooms.join(a.id, tx);

        swipe(&db_pool, &rooms, a.id, b.id, Direction::Right).await.unwrap();
        swipe(&db_pool, &rooms, a.id, b.id, Direction::Right).await.unwrap();
        assert_eq!(users::swiped_right(&db_pool, a.id).await.unwrap().len(), 1);

        swipe(&db_pool, &rooms, b.id, a.id, Direction::Right).await.unwrap();
        let again = swipe(&db_pool, &rooms, b.id, a.id, Direction::Right).await.unwrap();
        assert!(again.matched);
        assert!(!again.newly_matched);

        assert!(matches!(a_events.try_recv(), Ok(ServerEvent::MatchFound(_))));
        assert!(a_events.try_recv().is_err());
        assert_eq!(users::matches_of(&db_pool, a.id).await.unwrap().len(), 1);
        assert_eq!(users::swiped_right(&db_pool, b.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn joined_opposite_swipes_match_exactly_once() {
        let db_pool = memory_pool().await;
        let rooms = Rooms::new();
        let a = user(&db_pool, "a").await;
        let b = user(&db_pool, "b").await;
        let (a_tx, mut a_events) = mpsc::unbounded_channel();
        let (b_tx, mut b_events) = mpsc::unbounded_channel();
        let _ma = rooms.join(a.id, a_tx);
        let _mb = rooms.join(b.id, b_tx);

        let (ab, ba) = tokio::join!(
            swipe(&db_pool, &rooms, a.id, b.id, Direction::Right),
            swipe(&db_pool, &rooms, b.id, a.id, Direction::Right),
        );
        let (ab, ba) = (ab.unwrap(), ba.unwrap());

        assert!(ab.matched || ba.matched);
        assert!(ab.newly_matched ^ ba.newly_matched);
        assert!(users::is_matched(&db_pool, a.id, b.id).await.unwrap());

        let pushes = std::iter::from_fn(|| a_events.try_recv().ok()).count()
            + std::iter::from_fn(|| b_events.try_recv().ok()).count();
        assert_eq!(pushes, 1);
    }

    #[tokio::test]
    async fn self_swipe_is_invalid() {
        let db_pool = memory_pool().await;
        let a = user(&db_pool, "a").await;
        let err = swipe(&db_pool, &Rooms::new(), a.id, a.id, Direction::Right).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let db_pool = memory_pool().await;
        let a = user(&db_pool, "a").await;

        for direction in [Direction::Left, Direction::Right] {
            let err = swipe(&db_pool, &Rooms::new(), a.id, Uuid::now_v7(), direction)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
        assert!(users::swiped_right(&db_pool, a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_requests_follow_swipes() {
        let db_pool = memory_pool().await;
        let rooms = Rooms::new();
        let a = user(&db_pool, "a").await;
        let b = user(&db_pool, "b").await;

        swipe(&db_pool, &rooms, a.id, b.id, Direction::Right).await.unwrap();
        let for_a = users::pending_requests(&db_pool, a.id).await.unwrap();
        let for_b = users::pending_requests(&db_pool, b.id).await.unwrap();
        assert_eq!(for_a.sent, vec![b.clone()]);
        assert!(for_a.received.is_empty());
        assert_eq!(for_b.received, vec![a.clone()]);
        assert!(for_b.sent.is_empty());

        swipe(&db_pool, &rooms, b.id, a.id, Direction::Right).await.unwrap();
        let for_a = users::pending_requests(&db_pool, a.id).await.unwrap();
        let for_b = users::pending_requests(&db_pool, b.id).await.unwrap();
        assert!(for_a.sent.is_empty() && for_a.received.is_empty());
        assert!(for_b.sent.is_empty() && for_b.received.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn racing_opposite_swipes_on_a_shared_database_match_once_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("race.db").display());
        let db_pool = db::connect(&url, 8).await.unwrap();
        let rooms = Rooms::new();

        let mut pairs = Vec::new();
        let mut memberships = Vec::new();
        for i in 0..40 {
            let a = user(&db_pool, &format!("a{i}")).await;
            let b = user(&db_pool, &format!("b{i}")).await;
            let (a_tx, a_events) = mpsc::unbounded_channel();
            let (b_tx, b_events) = mpsc::unbounded_channel();
            memberships.push(rooms.join(a.id, a_tx));
            memberships.push(rooms.join(b.id, b_tx));
            pairs.push((a.id, b.id, a_events, b_events));
        }

        let mut tasks = Vec::new();
        for (a, b, _, _) in &pairs {
            for (actor, target) in [(*a, *b), (*b, *a)] {
                let db_pool = db_pool.clone();
                let rooms = rooms.clone();
                tasks.push(tokio::spawn(async move {
                    swipe(&db_pool, &rooms, actor, target, Direction::Right).await
                }));
            }
        }

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().newly_matched {
                created += 1;
            }
        }
        assert_eq!(created, pairs.len());

        let (rows,): (i64,) = sqlx::query_as("SELECT count(*) FROM matches")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(rows, pairs.len() as i64);

        for (a, b, mut a_events, mut b_events) in pairs {
            assert!(users::is_matched(&db_pool, a, b).await.unwrap());
            let pushes = std::iter::from_fn(|| a_events.try_recv().ok()).count()
                + std::iter::from_fn(|| b_events.try_recv().ok()).count();
            assert_eq!(pushes, 1);
        }
    }
}
