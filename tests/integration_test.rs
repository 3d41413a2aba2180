use cardroom::cards::{CardPool, MemoryRepository};
use cardroom::config::GameConfig;
use cardroom::hub::Outbound;
use cardroom::protocol::{ClientMessage, ServerMessage};
use cardroom::state::AppState;
use cardroom::types::*;
use cardroom::view::RoomView;
use cardroom::ws::handlers::handle_message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn test_state(white: usize) -> Arc<AppState> {
    let cards = CardPool::new(
        (0..white).map(|i| format!("White card {i}")).collect(),
        (0..40)
            .map(|i| BlackCard {
                text: format!("Prompt {i}: _."),
                pick: 1,
            })
            .collect(),
    );
    Arc::new(AppState::new(
        cards,
        Arc::new(MemoryRepository::default()),
        GameConfig {
            blank_card_ratio: 0.0,
            ..GameConfig::default()
        },
    ))
}

struct Client {
    connection: ConnectionId,
    rx: mpsc::UnboundedReceiver<Outbound>,
    /// Latest room projection seen, kept across drains
    view: Option<RoomView>,
}

impl Client {
    async fn connect(state: &Arc<AppState>, id: &str) -> Self {
        let connection = id.to_string();
        let rx = state.hub.register(&connection).await;
        Self {
            connection,
            rx,
            view: None,
        }
    }

    async fn send(&self, state: &Arc<AppState>, msg: ClientMessage) -> Option<ServerMessage> {
        handle_message(msg, &self.connection, state).await
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(Outbound::Message(msg)) = self.rx.try_recv() {
            if let ServerMessage::GameUpdate(view) = &msg {
                self.view = Some(view.as_ref().clone());
            }
            out.push(msg);
        }
        out
    }

    /// Most recent room projection delivered to this client
    fn last_view(&mut self) -> Option<RoomView> {
        self.drain();
        self.view.clone()
    }
}

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time and let timers and queue workers run
async fn wait(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    settle().await;
}

async fn create(state: &Arc<AppState>, host: &mut Client, name: &str, democratic: bool) -> RoomCode {
    let reply = host
        .send(
            state,
            ClientMessage::CreateGame {
                name: name.to_string(),
                win_target: Some(3),
                is_endless: false,
                is_democratic: democratic,
            },
        )
        .await;
    assert!(reply.is_none(), "unexpected reply: {reply:?}");
    host.drain()
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::GameCreated { code, .. } => Some(code),
            _ => None,
        })
        .expect("gameCreated")
}

/// Join and return (player id, seat token)
async fn join(
    state: &Arc<AppState>,
    client: &mut Client,
    code: &str,
    name: &str,
    token: Option<String>,
) -> (PlayerId, String) {
    let reply = client
        .send(
            state,
            ClientMessage::JoinGame {
                code: code.to_string(),
                name: name.to_string(),
                token,
            },
        )
        .await;
    assert!(reply.is_none(), "unexpected reply: {reply:?}");
    client
        .drain()
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::JoinSuccess {
                player_id, token, ..
            } => Some((player_id, token)),
            _ => None,
        })
        .expect("joinSuccess")
}

fn my_hand(view: &RoomView) -> Vec<String> {
    let me = view.you.as_ref().expect("seated viewer");
    view.players
        .iter()
        .find(|p| &p.id == me)
        .and_then(|p| p.hand.clone())
        .expect("own hand")
}

async fn play_first_card(state: &Arc<AppState>, client: &mut Client, code: &str) -> Vec<String> {
    settle().await;
    let view = client.last_view().expect("view");
    let cards = vec![my_hand(&view)[0].clone()];
    let reply = client
        .send(
            state,
            ClientMessage::SubmitCard {
                code: code.to_string(),
                cards: cards.clone(),
            },
        )
        .await;
    assert!(reply.is_none());
    cards
}

/// Every white card in the room: deck, discard, hands and submissions
async fn white_cards_in_room(state: &Arc<AppState>, code: &str) -> usize {
    let shared = state.rooms.get(code).await.unwrap();
    let room = shared.lock().await;
    room.white_deck.len()
        + room.discard.len()
        + room.players.iter().map(|p| p.hand.len()).sum::<usize>()
        + room.submissions.values().map(|s| s.cards.len()).sum::<usize>()
}

/// Three players, czar mode: the czar picks a winner, scores and the czar rotate
#[tokio::test(start_paused = true)]
async fn test_czar_game_flow() {
    let state = test_state(300);
    let mut alice = Client::connect(&state, "alice").await;
    let mut bob = Client::connect(&state, "bob").await;
    let mut carol = Client::connect(&state, "carol").await;

    let code = create(&state, &mut alice, "Alice", false).await;
    let (bob_id, _) = join(&state, &mut bob, &code, "Bob", None).await;
    join(&state, &mut carol, &code, "Carol", None).await;

    let reply = alice
        .send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;
    assert!(reply.is_none());

    let view = alice.last_view().unwrap();
    assert_eq!(view.state, RoomPhase::Playing);
    assert_eq!(view.round, 1);
    assert_eq!(view.current_czar.as_ref(), view.you.as_ref());
    assert_eq!(my_hand(&view).len(), HAND_SIZE);

    let bob_cards = play_first_card(&state, &mut bob, &code).await;

    // Carol sees that Bob submitted, not what
    let carol_view = carol.last_view().unwrap();
    assert_eq!(
        carol_view.submissions[&bob_id],
        vec![SUBMITTED_PLACEHOLDER.to_string()]
    );
    play_first_card(&state, &mut carol, &code).await;

    let czar_view = alice.last_view().unwrap();
    assert_eq!(czar_view.state, RoomPhase::Judging);
    assert_eq!(czar_view.shuffled_submissions.as_ref().map(Vec::len), Some(2));
    let carol_view = carol.last_view().unwrap();
    assert_eq!(carol_view.submissions[&bob_id], bob_cards);

    let reply = alice
        .send(
            &state,
            ClientMessage::CzarChoose {
                code: code.clone(),
                winning_cards: bob_cards.clone(),
            },
        )
        .await;
    assert!(reply.is_none());

    let view = carol.last_view().unwrap();
    let winner = view.round_winner_info.unwrap();
    assert_eq!(winner.name, "Bob");
    assert_eq!(
        winner.sentence,
        format!(
            "{}<strong>{}</strong>.",
            view.current_black_card.unwrap().text.trim_end_matches("_."),
            bob_cards[0]
        )
    );
    assert_eq!(
        view.players.iter().find(|p| p.id == bob_id).unwrap().score,
        1
    );

    wait(6).await;
    let view = bob.last_view().unwrap();
    assert_eq!(view.round, 2);
    assert_eq!(view.current_czar.as_ref(), Some(&bob_id));
    assert!(view.round_winner_info.is_none());
    assert_eq!(my_hand(&view).len(), HAND_SIZE);
}

/// A non-czar drops mid-round: the round proceeds without them and the seat is
/// released after the grace period
#[tokio::test(start_paused = true)]
async fn test_disconnect_grace_and_host_reassignment() {
    let state = test_state(300);
    let mut alice = Client::connect(&state, "alice").await;
    let mut bob = Client::connect(&state, "bob").await;
    let mut carol = Client::connect(&state, "carol").await;
    let mut dave = Client::connect(&state, "dave").await;

    let code = create(&state, &mut alice, "Alice", false).await;
    let (bob_id, _) = join(&state, &mut bob, &code, "Bob", None).await;
    join(&state, &mut carol, &code, "Carol", None).await;
    join(&state, &mut dave, &code, "Dave", None).await;
    alice
        .send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;

    play_first_card(&state, &mut bob, &code).await;
    play_first_card(&state, &mut carol, &code).await;

    // Dave leaves before submitting; judging opens with the two that are in
    state.disconnect(&dave.connection).await;
    let view = alice.last_view().unwrap();
    assert_eq!(view.state, RoomPhase::Judging);
    assert!(view.players.iter().any(|p| p.name == "Dave" && p.disconnected));

    wait(61).await;
    let view = alice.last_view().unwrap();
    assert_eq!(view.players.len(), 3);
    assert!(view.players.iter().all(|p| p.name != "Dave"));

    // Now the host leaves for good; the first active player takes over
    state.disconnect(&alice.connection).await;
    wait(61).await;
    let view = bob.last_view().unwrap();
    assert_eq!(view.host_id.as_ref(), Some(&bob_id));
    assert_eq!(view.players.len(), 2);
    assert_ne!(view.state, RoomPhase::Finished);
}

/// Czar leaves mid-round: everyone is told and a fresh round starts shortly after
#[tokio::test(start_paused = true)]
async fn test_czar_disconnect_restarts_round() {
    let state = test_state(300);
    let mut alice = Client::connect(&state, "alice").await;
    let mut bob = Client::connect(&state, "bob").await;
    let mut carol = Client::connect(&state, "carol").await;

    let code = create(&state, &mut alice, "Alice", false).await;
    join(&state, &mut bob, &code, "Bob", None).await;
    join(&state, &mut carol, &code, "Carol", None).await;
    alice
        .send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;
    play_first_card(&state, &mut bob, &code).await;
    bob.drain();

    state.disconnect(&alice.connection).await;
    let messages = bob.drain();
    assert!(messages.iter().any(|m| matches!(
        m,
        ServerMessage::ErrorMsg { fatal: false, text } if text == "The Card Czar (Alice) disconnected. Starting a new round."
    )));

    wait(4).await;
    let view = bob.last_view().unwrap();
    assert_eq!(view.round, 2);
    assert_eq!(view.state, RoomPhase::Playing);
    assert!(view.submissions.is_empty());
    assert_eq!(my_hand(&view).len(), HAND_SIZE, "submitted card was replaced");
}

/// Democratic mode, 2-2 split: the host's pick breaks the tie
#[tokio::test(start_paused = true)]
async fn test_democratic_tie_break() {
    let state = test_state(300);
    let mut clients = Vec::new();
    for id in ["alice", "bob", "carol", "dave"] {
        clients.push(Client::connect(&state, id).await);
    }
    let code = create(&state, &mut clients[0], "Alice", true).await;
    let mut ids = vec![{
        let shared = state.rooms.get(&code).await.unwrap();
        let room = shared.lock().await;
        room.players[0].id.clone()
    }];
    for (i, name) in ["Bob", "Carol", "Dave"].iter().enumerate() {
        let (id, _) = join(&state, &mut clients[i + 1], &code, name, None).await;
        ids.push(id);
    }
    clients[0]
        .send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;

    for client in clients.iter_mut() {
        play_first_card(&state, client, &code).await;
    }
    let view = clients[1].last_view().unwrap();
    assert_eq!(view.state, RoomPhase::Voting);
    assert!(view.current_czar.is_none());
    assert_eq!(view.shuffled_submissions.map(|s| s.len()), Some(4));

    // Alice → Bob, Bob → Carol, Carol → Bob, Dave → Carol
    let picks = [1, 2, 1, 2];
    for (voter, target) in picks.iter().enumerate() {
        let reply = clients[voter]
            .send(
                &state,
                ClientMessage::PlayerVote {
                    code: code.clone(),
                    submission_owner_id: ids[*target].clone(),
                },
            )
            .await;
        assert!(reply.is_none());
    }

    let view = clients[2].last_view().unwrap();
    let winner = view.round_winner_info.expect("round decided");
    assert_eq!(winner.name, "Bob");
    assert_eq!(view.players[1].score, 1);
    assert_eq!(view.players[2].score, 0);
}

/// Write-your-own card: 160 characters is refused, 10 is accepted
#[tokio::test]
async fn test_blank_card_lengths() {
    let state = test_state(300);
    let mut alice = Client::connect(&state, "alice").await;
    let mut bob = Client::connect(&state, "bob").await;
    let code = create(&state, &mut alice, "Alice", false).await;
    join(&state, &mut bob, &code, "Bob", None).await;
    alice
        .send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;
    {
        let shared = state.rooms.get(&code).await.unwrap();
        shared.lock().await.players[1].hand[3] = BLANK_CARD.to_string();
    }

    let reply = bob
        .send(
            &state,
            ClientMessage::SubmitBlankCard {
                code: code.clone(),
                card_text: "y".repeat(160),
            },
        )
        .await;
    match reply {
        Some(ServerMessage::ErrorMsg { text, fatal }) => {
            assert!(!fatal);
            assert_eq!(text, "Custom cards must be between 1 and 150 characters.");
        }
        other => panic!("expected errorMsg, got {other:?}"),
    }

    let reply = bob
        .send(
            &state,
            ClientMessage::SubmitBlankCard {
                code: code.clone(),
                card_text: "Ten chars!".to_string(),
            },
        )
        .await;
    assert!(reply.is_none());

    // Two players: Bob's card completes the round
    let view = alice.last_view().unwrap();
    assert_eq!(view.state, RoomPhase::Judging);
    let entries = view.shuffled_submissions.unwrap();
    assert_eq!(entries[0].cards, vec!["Ten chars!".to_string()]);
}

/// Joining again, from the same socket or with the seat token after a drop,
/// never creates a second seat or a new token
#[tokio::test]
async fn test_join_idempotence_and_token_reconnect() {
    let state = test_state(300);
    let mut alice = Client::connect(&state, "alice").await;
    let mut bob = Client::connect(&state, "bob").await;
    let code = create(&state, &mut alice, "Alice", false).await;

    let (id1, token1) = join(&state, &mut bob, &code, "Bob", None).await;
    let (id2, token2) = join(&state, &mut bob, &code, "Bob", None).await;
    assert_eq!((id1.clone(), token1.clone()), (id2, token2));

    state.disconnect(&bob.connection).await;
    let view = alice.last_view().unwrap();
    assert!(view.players.iter().any(|p| p.id == id1 && p.disconnected));

    let mut bob_again = Client::connect(&state, "bob-2").await;
    let (id3, token3) = join(&state, &mut bob_again, &code, "Bob", Some(token1.clone())).await;
    assert_eq!((id3, token3), (id1, token1));

    let view = alice.last_view().unwrap();
    assert_eq!(view.players.len(), 2);
    assert!(view.players.iter().all(|p| !p.disconnected));

    // A stranger may not take the name
    let mut mallory = Client::connect(&state, "mallory").await;
    let reply = mallory
        .send(
            &state,
            ClientMessage::JoinGame {
                code: code.clone(),
                name: "bob".to_string(),
                token: None,
            },
        )
        .await;
    assert!(matches!(reply, Some(ServerMessage::ErrorMsg { fatal: true, .. })));
    assert!(mallory.drain().is_empty());
}

/// The host token binds a fresh connection as host only through the host seat
#[tokio::test]
async fn test_host_token_resyncs_host_seat() {
    let state = test_state(300);
    let mut alice = Client::connect(&state, "alice").await;
    alice
        .send(
            &state,
            ClientMessage::CreateGame {
                name: "Alice".to_string(),
                win_target: None,
                is_endless: true,
                is_democratic: false,
            },
        )
        .await;
    let (code, host_token, host_id) = alice
        .drain()
        .into_iter()
        .find_map(|m| match m {
            ServerMessage::GameCreated {
                code,
                token,
                player_id,
                ..
            } => Some((code, token, player_id)),
            _ => None,
        })
        .unwrap();

    let mut second_tab = Client::connect(&state, "alice-tab").await;
    let (id, token) = join(&state, &mut second_tab, &code, "Alice", Some(host_token.clone())).await;
    assert_eq!(id, host_id);
    assert_eq!(token, host_token);

    let view = second_tab.last_view().unwrap();
    assert_eq!(view.host_id, Some(host_id.clone()));
    assert_eq!(view.players.len(), 1);
    assert!(view.win_target.is_none());

    // The first tab is told and no longer routed to the room
    assert!(alice.drain().iter().any(|m| matches!(
        m,
        ServerMessage::ErrorMsg { fatal: true, .. }
    )));
    assert_eq!(state.hub.route(&alice.connection).await, None);

    // Closing it leaves the seat connected
    state.disconnect(&alice.connection).await;
    let shared = state.rooms.get(&code).await.unwrap();
    let room = shared.lock().await;
    let seat = room.player(&host_id).unwrap();
    assert!(!seat.disconnected);
    assert_eq!(seat.connection, second_tab.connection);
}

/// White cards are never duplicated or lost across rounds, including when the
/// discard pile is shuffled back into a short deck
#[tokio::test(start_paused = true)]
async fn test_card_conservation_over_rounds() {
    let state = test_state(70);
    let mut clients = vec![
        Client::connect(&state, "alice").await,
        Client::connect(&state, "bob").await,
        Client::connect(&state, "carol").await,
    ];
    let code = create(&state, &mut clients[0], "Alice", false).await;
    join(&state, &mut clients[1], &code, "Bob", None).await;
    join(&state, &mut clients[2], &code, "Carol", None).await;
    clients[0]
        .send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;
    assert_eq!(white_cards_in_room(&state, &code).await, 70);

    let mut ids = Vec::new();
    {
        let shared = state.rooms.get(&code).await.unwrap();
        let room = shared.lock().await;
        for client in &clients {
            ids.push(room.player_by_connection(&client.connection).unwrap().id.clone());
        }
    }

    // Win target is 3; rotating the winner keeps every score below it
    for round in 0..3 {
        let czar = round % 3;
        let winner = (round + 1) % 3;
        let mut winning = Vec::new();
        for (i, client) in clients.iter_mut().enumerate() {
            if i == czar {
                client.drain();
                continue;
            }
            let cards = play_first_card(&state, client, &code).await;
            if i == winner {
                winning = cards;
            }
        }
        assert_eq!(white_cards_in_room(&state, &code).await, 70);

        let reply = clients[czar]
            .send(
                &state,
                ClientMessage::CzarChoose {
                    code: code.clone(),
                    winning_cards: winning,
                },
            )
            .await;
        assert!(reply.is_none());
        wait(6).await;
        assert_eq!(white_cards_in_room(&state, &code).await, 70);
    }

    let shared = state.rooms.get(&code).await.unwrap();
    let room = shared.lock().await;
    assert_eq!(room.round, 4);
    assert_eq!(room.current_czar.as_ref(), Some(&ids[0]));
    assert!(room.players.iter().all(|p| p.score == 1));
}

/// Concurrent submissions from many sockets are each applied exactly once
#[tokio::test]
async fn test_concurrent_submissions_are_serialized() {
    let state = test_state(400);
    let mut host = Client::connect(&state, "host").await;
    let code = create(&state, &mut host, "Host", false).await;

    let mut players = Vec::new();
    for i in 0..8 {
        let mut client = Client::connect(&state, &format!("p{i}")).await;
        join(&state, &mut client, &code, &format!("Player {i}"), None).await;
        players.push(client);
    }
    host.send(&state, ClientMessage::StartGame { code: code.clone() })
        .await;

    let mut tasks = Vec::new();
    for mut client in players {
        let state = state.clone();
        let code = code.clone();
        tasks.push(tokio::spawn(async move {
            let view = client.last_view().unwrap();
            let hand = my_hand(&view);
            // Every client fires twice; only the first may count
            for card in hand.into_iter().take(2) {
                client
                    .send(
                        &state,
                        ClientMessage::SubmitCard {
                            code: code.clone(),
                            cards: vec![card],
                        },
                    )
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let shared = state.rooms.get(&code).await.unwrap();
    let room = shared.lock().await;
    assert_eq!(room.submissions.len(), 8);
    assert_eq!(room.phase, RoomPhase::Judging);
    for player in room.players.iter().filter(|p| !room.is_czar(&p.id)) {
        assert_eq!(player.hand.len(), HAND_SIZE - 1);
    }
}
