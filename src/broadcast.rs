use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::Room;
use crate::view::RoomView;

impl AppState {
    /// Send every connected seat its own projection of the room
    pub async fn broadcast_room(&self, room: &Room) {
        for player in room.players.iter().filter(|p| !p.disconnected) {
            let view = RoomView::for_viewer(room, Some(&player.id));
            self.hub
                .send(&player.connection, ServerMessage::GameUpdate(Box::new(view)))
                .await;
        }
    }

    /// Same message to every connected seat
    pub async fn send_to_room(&self, room: &Room, message: ServerMessage) {
        for player in room.players.iter().filter(|p| !p.disconnected) {
            self.hub.send(&player.connection, message.clone()).await;
        }
    }
}
