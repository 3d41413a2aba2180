//! Room state machine.
//!
//! Everything here is synchronous and side-effect free apart from mutating the
//! [`Room`]. Callers hold the room's queue slot, apply a transition, then broadcast
//! and schedule follow-up timers based on the returned outcome.

use std::collections::HashMap;

use crate::deck::{generate_token, shuffle};
use crate::error::{RoomError, RoomResult};
use crate::types::*;

/// Why and how a game ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEnd {
    pub reason: String,
    pub winner: Option<PlayerId>,
}

impl GameEnd {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            winner: None,
        }
    }

    pub fn with_winner(reason: impl Into<String>, winner: PlayerId) -> Self {
        Self {
            reason: reason.into(),
            winner: Some(winner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundStart {
    Started { cancelled_end_vote: bool },
    /// Fewer than two active players; the room went back to waiting
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub winner_id: PlayerId,
    pub winner_name: String,
    pub reached_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Winner(PlayerId),
    Tie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndVoteStatus {
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new seat was created
    Joined(PlayerId),
    /// A disconnected seat was picked up again
    Rejoined(PlayerId),
    /// The seat was already live on this connection; nothing new was issued
    AlreadySeated(PlayerId),
    /// A live seat moved to a new connection; `previous` no longer owns it
    TookOver {
        id: PlayerId,
        previous: ConnectionId,
    },
}

impl JoinOutcome {
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Self::Joined(id) | Self::Rejoined(id) | Self::AlreadySeated(id) => id,
            Self::TookOver { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub player_id: PlayerId,
    /// The czar left before judging finished
    pub czar_left_mid_round: bool,
}

#[derive(Debug)]
pub struct Removal {
    pub player: Player,
    pub promoted_host: Option<PlayerId>,
    /// The host left and nobody could take over
    pub host_lost: bool,
}

/// What re-checking a round after a membership change did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassessment {
    Unchanged,
    RevertedToWaiting,
    Revealed,
    Voted(VoteOutcome),
}

pub fn validate_name(name: &str) -> RoomResult<()> {
    let len = name.trim().chars().count();
    if (MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        Ok(())
    } else {
        Err(RoomError::InvalidName)
    }
}

/// Endless games have no target; otherwise 1..=100, defaulting to 7
pub fn validate_win_target(win_target: Option<u32>, is_endless: bool) -> RoomResult<Option<u32>> {
    if is_endless {
        return Ok(None);
    }
    match win_target {
        None => Ok(Some(DEFAULT_WIN_TARGET)),
        Some(t) if (1..=MAX_WIN_TARGET).contains(&t) => Ok(Some(t)),
        Some(_) => Err(RoomError::InvalidWinTarget),
    }
}

/// Trim a write-your-own card and check its length
pub fn validate_custom_text(raw: &str) -> RoomResult<String> {
    let text = raw.trim();
    let len = text.chars().count();
    if len == 0 || len > MAX_CUSTOM_CARD_CHARS {
        return Err(RoomError::InvalidCardText);
    }
    Ok(text.to_string())
}

/// Next czar slot given the previous one and how many players are active now
pub fn next_czar_index(previous: Option<usize>, active_count: usize) -> usize {
    match previous {
        Some(i) if active_count > 0 => (i + 1) % active_count,
        _ => 0,
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fill the prompt's `_` blanks with the winning cards, or list the cards
/// when the counts disagree
pub fn winning_sentence(prompt: &str, cards: &[String]) -> String {
    let blanks = prompt.matches('_').count();
    if blanks != cards.len() {
        return cards
            .iter()
            .map(|c| escape_html(c))
            .collect::<Vec<_>>()
            .join(" / ");
    }

    let mut sentence = String::with_capacity(prompt.len());
    let mut cards = cards.iter();
    for c in prompt.chars() {
        if c == '_' {
            if let Some(card) = cards.next() {
                sentence.push_str("<strong>");
                sentence.push_str(&escape_html(card));
                sentence.push_str("</strong>");
                continue;
            }
        }
        sentence.push(c);
    }
    sentence
}

/// Strict plurality wins; a tie goes to the tie-breaker's pick if it is among the leaders
pub fn resolve_votes(
    votes: &HashMap<PlayerId, PlayerId>,
    tie_breaker: Option<&PlayerId>,
) -> VoteOutcome {
    let counts = tally(votes);
    let Some(max) = counts.values().copied().max() else {
        return VoteOutcome::Tie;
    };

    let leaders: Vec<&PlayerId> = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(id, _)| id)
        .collect();
    if let [leader] = leaders.as_slice() {
        return VoteOutcome::Winner((*leader).clone());
    }

    match tie_breaker.and_then(|t| votes.get(t)) {
        Some(pick) if counts.get(pick) == Some(&max) => VoteOutcome::Winner(pick.clone()),
        _ => VoteOutcome::Tie,
    }
}

pub fn tally(votes: &HashMap<PlayerId, PlayerId>) -> HashMap<PlayerId, u32> {
    let mut counts = HashMap::new();
    for owner in votes.values() {
        *counts.entry(owner.clone()).or_insert(0) += 1;
    }
    counts
}

impl Room {
    /// New waiting room with freshly shuffled decks.
    /// `blank_ratio` of the white pool is added as write-your-own placeholders.
    pub fn new(
        code: RoomCode,
        settings: RoomSettings,
        white: Vec<String>,
        black: Vec<BlackCard>,
        blank_ratio: f64,
    ) -> Self {
        let blanks = (white.len() as f64 * blank_ratio.max(0.0)).floor() as usize;
        let mut white_deck = white;
        white_deck.extend(std::iter::repeat(BLANK_CARD.to_string()).take(blanks));
        shuffle(&mut white_deck);

        let mut black_deck = black;
        shuffle(&mut black_deck);

        Self {
            code,
            host_id: None,
            host_token: generate_token(),
            phase: RoomPhase::Waiting,
            round: 0,
            settings,
            players: Vec::new(),
            czar_index: None,
            current_czar: None,
            current_black_card: None,
            submissions: HashMap::new(),
            round_winner_info: None,
            votes: HashMap::new(),
            vote_to_end: VoteToEndState::default(),
            white_deck,
            black_deck,
            discard: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    // ========== Queries ==========

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_players().count()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    /// Live seat bound to this connection
    pub fn player_by_connection(&self, connection: &ConnectionId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.connection == *connection && !p.disconnected)
    }

    pub fn is_host(&self, id: &PlayerId) -> bool {
        self.host_id.as_ref() == Some(id)
    }

    pub fn is_czar(&self, id: &PlayerId) -> bool {
        !self.settings.is_democratic && self.current_czar.as_ref() == Some(id)
    }

    pub fn round_decided(&self) -> bool {
        self.round_winner_info.is_some()
    }

    /// Submissions needed before judging or voting opens
    pub fn required_submissions(&self) -> usize {
        let active = self.active_count();
        if self.settings.is_democratic {
            active
        } else {
            active.saturating_sub(1)
        }
    }

    /// Submissions that count toward the threshold: those of active players
    pub fn counted_submissions(&self) -> usize {
        self.submissions
            .keys()
            .filter(|id| self.player(id).is_some_and(|p| p.is_active()))
            .count()
    }

    /// Highest-scoring active player (the later one on equal scores)
    pub fn leader(&self) -> Option<&Player> {
        self.active_players().max_by_key(|p| p.score)
    }

    pub fn vote_counts(&self) -> HashMap<PlayerId, u32> {
        tally(&self.votes)
    }

    // ========== Membership ==========

    /// Seat the room's creator as host
    pub fn seat_host(&mut self, name: &str, connection: &ConnectionId) -> PlayerId {
        let player = Player::new(
            name.trim().to_string(),
            connection.clone(),
            self.host_token.clone(),
        );
        let id = player.id.clone();
        self.players.push(player);
        self.host_id = Some(id.clone());
        id
    }

    /// Resolve a join request: same connection, then token, then name
    pub fn join(
        &mut self,
        name: &str,
        connection: &ConnectionId,
        token: Option<&str>,
    ) -> RoomResult<JoinOutcome> {
        if let Some(player) = self.player_by_connection(connection) {
            return Ok(JoinOutcome::AlreadySeated(player.id.clone()));
        }

        if let Some(token) = token {
            if let Some(index) = self.players.iter().position(|p| p.token == token) {
                return Ok(self.rebind(index, connection));
            }
        }

        let name = name.trim();
        validate_name(name)?;

        if name != SPECTATOR_NAME {
            let lower = name.to_lowercase();
            if let Some(index) = self
                .players
                .iter()
                .position(|p| p.name.to_lowercase() == lower)
            {
                // A presented token that did not match this seat is a conflict
                if self.players[index].disconnected && token.is_none() {
                    return Ok(self.rebind(index, connection));
                }
                return Err(RoomError::NameTaken);
            }
        }

        let claims_host = name != SPECTATOR_NAME
            && self.host_id.is_none()
            && token == Some(self.host_token.as_str());
        let token = if claims_host {
            self.host_token.clone()
        } else {
            generate_token()
        };

        let mut player = Player::new(name.to_string(), connection.clone(), token);
        if self.phase.in_round() && !player.is_spectator() {
            // Late joiners get a hand right away so they can play this round
            while player.hand.len() < HAND_SIZE {
                match self.white_deck.pop() {
                    Some(card) => player.hand.push(card),
                    None => break,
                }
            }
        }

        let id = player.id.clone();
        self.players.push(player);
        if claims_host {
            self.host_id = Some(id.clone());
        }
        Ok(JoinOutcome::Joined(id))
    }

    fn rebind(&mut self, index: usize, connection: &ConnectionId) -> JoinOutcome {
        let player = &mut self.players[index];
        let previous = std::mem::replace(&mut player.connection, connection.clone());
        player.cancel_removal();
        let id = player.id.clone();
        if std::mem::replace(&mut player.disconnected, false) {
            JoinOutcome::Rejoined(id)
        } else if previous != *connection {
            JoinOutcome::TookOver { id, previous }
        } else {
            JoinOutcome::AlreadySeated(id)
        }
    }

    /// Flag the seat bound to `connection` as disconnected, keeping it for a grace period
    pub fn mark_disconnected(&mut self, connection: &ConnectionId) -> Option<Disconnect> {
        let czar_mid_round = matches!(self.phase, RoomPhase::Playing | RoomPhase::Judging)
            && !self.round_decided();
        let player = self
            .players
            .iter_mut()
            .find(|p| p.connection == *connection && !p.disconnected)?;
        player.disconnected = true;
        let player_id = player.id.clone();

        Some(Disconnect {
            czar_left_mid_round: czar_mid_round && self.is_czar(&player_id),
            player_id,
        })
    }

    /// Take a seat out of the room for good. Cards it held go to the discard pile.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Removal> {
        let index = self.players.iter().position(|p| p.id == *id)?;
        let mut player = self.players.remove(index);
        player.cancel_removal();

        self.discard
            .extend(player.hand.drain(..).filter(|c| c != BLANK_CARD));
        if let Some(submission) = self.submissions.remove(id) {
            if !submission.custom {
                self.discard.extend(submission.cards);
            }
        }
        self.votes.retain(|voter, owner| voter != id && owner != id);
        self.vote_to_end.votes.remove(id);

        let mut promoted_host = None;
        let mut host_lost = false;
        if self.is_host(id) {
            promoted_host = self.active_players().next().map(|p| p.id.clone());
            host_lost = promoted_host.is_none();
            self.host_id = promoted_host.clone();
        }

        Some(Removal {
            player,
            promoted_host,
            host_lost,
        })
    }

    /// Host removes a player from the lobby
    pub fn kick(&mut self, host_id: &PlayerId, target: &PlayerId) -> RoomResult<Removal> {
        if !self.is_host(host_id) {
            return Err(RoomError::Rejected("only the host can kick"));
        }
        if self.phase != RoomPhase::Waiting {
            return Err(RoomError::Rejected("kicking is only allowed in the lobby"));
        }
        if host_id == target {
            return Err(RoomError::Rejected("the host cannot kick themselves"));
        }
        self.remove_player(target)
            .ok_or(RoomError::Rejected("no such player"))
    }

    /// Non-spectator seats still held, connected or not
    pub fn seated_players(&self) -> usize {
        self.players.iter().filter(|p| !p.is_spectator()).count()
    }

    /// Re-check a running round after players came or went
    pub fn reassess(&mut self) -> Reassessment {
        if !self.phase.in_round() {
            return Reassessment::Unchanged;
        }
        if self.active_count() < 2 {
            self.phase = RoomPhase::Waiting;
            self.current_czar = None;
            return Reassessment::RevertedToWaiting;
        }
        let phase = self.phase;
        match phase {
            RoomPhase::Playing if self.try_reveal() => Reassessment::Revealed,
            RoomPhase::Voting => match self.settle_votes() {
                Some(outcome) => Reassessment::Voted(outcome),
                None => Reassessment::Unchanged,
            },
            _ => Reassessment::Unchanged,
        }
    }

    // ========== Rounds ==========

    /// Host may start from the lobby once two players are active
    pub fn check_start(&self, player_id: &PlayerId) -> RoomResult<()> {
        if !self.is_host(player_id) {
            return Err(RoomError::Rejected("only the host can start"));
        }
        if self.phase != RoomPhase::Waiting {
            return Err(RoomError::Rejected("game already running"));
        }
        if self.active_count() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }
        Ok(())
    }

    /// Set up the next round: recycle, deal, rotate czar, draw a prompt
    pub fn begin_round(&mut self) -> Result<RoundStart, GameEnd> {
        if self.black_deck.is_empty() {
            return Err(GameEnd::new("Out of black cards!"));
        }
        if self.active_count() < 2 {
            self.phase = RoomPhase::Waiting;
            self.current_czar = None;
            return Ok(RoundStart::Deferred);
        }

        for (_, submission) in self.submissions.drain() {
            if !submission.custom {
                self.discard.extend(submission.cards);
            }
        }
        if self.white_deck.len() < DECK_LOW_WATERMARK && !self.discard.is_empty() {
            self.white_deck.append(&mut self.discard);
            shuffle(&mut self.white_deck);
        }

        for player in self.players.iter_mut().filter(|p| p.is_active()) {
            while player.hand.len() < HAND_SIZE {
                match self.white_deck.pop() {
                    Some(card) => player.hand.push(card),
                    None => return Err(GameEnd::new("Not enough white cards to continue.")),
                }
            }
        }

        self.round += 1;
        self.phase = RoomPhase::Playing;
        self.round_winner_info = None;
        self.votes.clear();

        let cancelled_end_vote = self.vote_to_end.in_progress;
        if cancelled_end_vote {
            self.vote_to_end = VoteToEndState::default();
        }

        if self.settings.is_democratic {
            self.current_czar = None;
        } else {
            let index = next_czar_index(self.czar_index, self.active_count());
            self.czar_index = Some(index);
            let czar = self.active_players().nth(index).map(|p| p.id.clone());
            self.current_czar = czar;
        }

        self.current_black_card = self.black_deck.pop();
        Ok(RoundStart::Started { cancelled_end_vote })
    }

    fn check_can_submit(&self, player_id: &PlayerId) -> RoomResult<&Player> {
        if self.phase != RoomPhase::Playing {
            return Err(RoomError::Rejected("not accepting submissions"));
        }
        let player = self
            .player(player_id)
            .filter(|p| p.is_active())
            .ok_or(RoomError::Rejected("not an active player"))?;
        if self.is_czar(player_id) {
            return Err(RoomError::Rejected("the czar does not submit"));
        }
        if self.submissions.contains_key(player_id) {
            return Err(RoomError::Rejected("already submitted"));
        }
        Ok(player)
    }

    /// Play cards from hand for the current prompt
    pub fn submit_cards(&mut self, player_id: &PlayerId, cards: Vec<String>) -> RoomResult<()> {
        let player = self.check_can_submit(player_id)?;
        let pick = self.current_black_card.as_ref().map_or(1, |b| b.pick as usize);
        if cards.len() != pick {
            return Err(RoomError::Rejected("wrong number of cards"));
        }
        if cards.iter().any(|c| c == BLANK_CARD) {
            return Err(RoomError::Rejected("blank cards must be written first"));
        }

        let mut remaining = player.hand.clone();
        for card in &cards {
            let index = remaining
                .iter()
                .position(|c| c == card)
                .ok_or(RoomError::Rejected("card not in hand"))?;
            remaining.remove(index);
        }

        if let Some(player) = self.player_mut(player_id) {
            player.hand = remaining;
        }
        self.submissions.insert(
            player_id.clone(),
            Submission {
                cards,
                custom: false,
            },
        );
        Ok(())
    }

    /// Player may spend a blank card right now
    pub fn check_custom_submission(&self, player_id: &PlayerId) -> RoomResult<()> {
        let player = self.check_can_submit(player_id)?;
        if !player.hand.iter().any(|c| c == BLANK_CARD) {
            return Err(RoomError::Rejected("no blank card in hand"));
        }
        Ok(())
    }

    /// Spend a blank card on `text`. When the text is new to the card pool it
    /// also joins this room's deck.
    pub fn submit_custom_card(
        &mut self,
        player_id: &PlayerId,
        text: String,
        new_to_pool: bool,
    ) -> RoomResult<()> {
        self.check_custom_submission(player_id)?;

        if let Some(player) = self.player_mut(player_id) {
            if let Some(index) = player.hand.iter().position(|c| c == BLANK_CARD) {
                player.hand.remove(index);
            }
        }
        if new_to_pool {
            self.white_deck.push(text.clone());
            shuffle(&mut self.white_deck);
        }
        self.submissions.insert(
            player_id.clone(),
            Submission {
                cards: vec![text],
                custom: true,
            },
        );
        Ok(())
    }

    /// Open judging (or voting) once every expected submission is in
    pub fn try_reveal(&mut self) -> bool {
        if self.phase != RoomPhase::Playing {
            return false;
        }
        let required = self.required_submissions();
        if required == 0 || self.counted_submissions() < required {
            return false;
        }
        self.phase = if self.settings.is_democratic {
            RoomPhase::Voting
        } else {
            RoomPhase::Judging
        };
        self.votes.clear();
        true
    }

    /// Czar picks the winning cards
    pub fn choose_winner(
        &mut self,
        czar_id: &PlayerId,
        winning_cards: &[String],
    ) -> RoomResult<RoundResult> {
        if self.settings.is_democratic || self.phase != RoomPhase::Judging {
            return Err(RoomError::Rejected("not judging"));
        }
        if !self.is_czar(czar_id) {
            return Err(RoomError::Rejected("only the czar can judge"));
        }
        if self.round_decided() {
            return Err(RoomError::Rejected("round already decided"));
        }

        let matching: Vec<&PlayerId> = self
            .submissions
            .iter()
            .filter(|(_, s)| s.cards == winning_cards)
            .map(|(id, _)| id)
            .collect();
        let winner_id = match matching.as_slice() {
            [only] => (*only).clone(),
            _ => return Err(RoomError::Rejected("no unique matching submission")),
        };

        self.award_round(&winner_id)
    }

    /// Give the round to `winner_id` and record the filled-in sentence
    pub fn award_round(&mut self, winner_id: &PlayerId) -> RoomResult<RoundResult> {
        let cards = self
            .submissions
            .get(winner_id)
            .map(|s| s.cards.clone())
            .ok_or(RoomError::Rejected("winner has no submission"))?;
        let prompt = self
            .current_black_card
            .as_ref()
            .map(|b| b.text.clone())
            .unwrap_or_default();
        let win_target = self.settings.win_target.filter(|_| !self.settings.is_endless);

        let winner = self
            .player_mut(winner_id)
            .ok_or(RoomError::Rejected("winner left the game"))?;
        winner.score += 1;
        let result = RoundResult {
            winner_id: winner.id.clone(),
            winner_name: winner.name.clone(),
            reached_target: win_target.is_some_and(|t| winner.score >= t),
        };

        self.round_winner_info = Some(RoundWinnerInfo {
            name: result.winner_name.clone(),
            sentence: winning_sentence(&prompt, &cards),
        });
        Ok(result)
    }

    /// Close a democratic round without points
    pub fn declare_tie(&mut self) {
        self.round_winner_info = Some(RoundWinnerInfo {
            name: "It's a tie!".to_string(),
            sentence: "No points awarded.".to_string(),
        });
    }

    /// Record a democratic vote; returns the outcome once everyone has voted
    pub fn cast_vote(
        &mut self,
        voter_id: &PlayerId,
        owner_id: &PlayerId,
    ) -> RoomResult<Option<VoteOutcome>> {
        if !self.settings.is_democratic || self.phase != RoomPhase::Voting {
            return Err(RoomError::Rejected("not voting"));
        }
        if self.round_decided() {
            return Err(RoomError::Rejected("round already decided"));
        }
        if !self.player(voter_id).is_some_and(|p| p.is_active()) {
            return Err(RoomError::Rejected("not an active player"));
        }
        if voter_id == owner_id {
            return Err(RoomError::Rejected("cannot vote for yourself"));
        }
        if self.votes.contains_key(voter_id) {
            return Err(RoomError::Rejected("already voted"));
        }
        if !self.submissions.contains_key(owner_id) {
            return Err(RoomError::Rejected("no such submission"));
        }

        self.votes.insert(voter_id.clone(), owner_id.clone());
        Ok(self.settle_votes())
    }

    /// Outcome of the vote if every active player has voted. The host breaks ties.
    pub fn settle_votes(&self) -> Option<VoteOutcome> {
        if self.phase != RoomPhase::Voting || self.round_decided() {
            return None;
        }
        let active_voters = self
            .votes
            .keys()
            .filter(|id| self.player(id).is_some_and(|p| p.is_active()))
            .count();
        if active_voters < self.active_count() {
            return None;
        }
        Some(resolve_votes(&self.votes, self.host_id.as_ref()))
    }

    // ========== Vote to end ==========

    /// Open a vote to end an endless game; the initiator votes yes
    pub fn start_end_vote(
        &mut self,
        player_id: &PlayerId,
        rule: EndVoteRule,
    ) -> RoomResult<(String, EndVoteStatus)> {
        if !self.settings.is_endless || self.phase == RoomPhase::Finished {
            return Err(RoomError::Rejected("only endless games can be voted to an end"));
        }
        if self.vote_to_end.in_progress {
            return Err(RoomError::Rejected("a vote is already running"));
        }
        let name = self
            .player(player_id)
            .filter(|p| p.is_active())
            .map(|p| p.name.clone())
            .ok_or(RoomError::Rejected("not an active player"))?;

        self.vote_to_end = VoteToEndState {
            in_progress: true,
            initiator_name: Some(name.clone()),
            votes: HashMap::from([(player_id.clone(), EndVote::Yes)]),
        };
        Ok((name, self.settle_end_vote(rule)))
    }

    pub fn cast_end_vote(
        &mut self,
        player_id: &PlayerId,
        vote: EndVote,
        rule: EndVoteRule,
    ) -> RoomResult<EndVoteStatus> {
        if !self.vote_to_end.in_progress {
            return Err(RoomError::Rejected("no vote running"));
        }
        if !self.player(player_id).is_some_and(|p| p.is_active()) {
            return Err(RoomError::Rejected("not an active player"));
        }
        if self.vote_to_end.votes.contains_key(player_id) {
            return Err(RoomError::Rejected("already voted"));
        }
        self.vote_to_end.votes.insert(player_id.clone(), vote);
        Ok(self.settle_end_vote(rule))
    }

    /// Decide the running end vote if possible; a decided vote is cleared
    pub fn settle_end_vote(&mut self, rule: EndVoteRule) -> EndVoteStatus {
        if !self.vote_to_end.in_progress {
            return EndVoteStatus::Pending;
        }
        let active = self.active_count();
        // Ballots of seats that have since dropped out do not count
        let count = |wanted: EndVote| {
            self.vote_to_end
                .votes
                .iter()
                .filter(|(id, v)| **v == wanted && self.player(id).is_some_and(|p| p.is_active()))
                .count()
        };
        let (yes, no) = (count(EndVote::Yes), count(EndVote::No));

        let status = match rule {
            EndVoteRule::Unanimous if no > 0 => EndVoteStatus::Failed,
            EndVoteRule::Unanimous if yes >= active => EndVoteStatus::Passed,
            EndVoteRule::Unanimous => EndVoteStatus::Pending,
            EndVoteRule::Majority => {
                let needed = active.div_ceil(2).max(1);
                if yes >= needed {
                    EndVoteStatus::Passed
                } else if active.saturating_sub(no) < needed {
                    EndVoteStatus::Failed
                } else {
                    EndVoteStatus::Pending
                }
            }
        };

        if status != EndVoteStatus::Pending {
            self.vote_to_end = VoteToEndState::default();
        }
        status
    }

    /// Enter the terminal state
    pub fn finish(&mut self) {
        self.phase = RoomPhase::Finished;
        self.vote_to_end = VoteToEndState::default();
        for player in &mut self.players {
            player.cancel_removal();
        }
    }
}
