use super::*;

impl App {
    /// Writes the active conversation's transcript and canvas back into the
    /// store and flushes. Called after every message/state change so an exit
    /// flush never writes stale data.
    pub(super) fn sync_active(&mut self) {
        self.conversations
            .record_active(&self.messages, &self.canvas.snapshot());
        self.conversations.persist();
    }

    /// Loads the selected conversation's transcript and canvas into the app.
    pub(super) fn load_selected(&mut self) {
        let selected = self.conversations.selected();
        self.messages = selected.messages.clone();
        self.canvas = CanvasStore::from_state(selected.state.clone());
        self.entries = entries_from_messages(&self.messages);
        self.gate = None;
        self.angle = None;
        self.pending_actions.clear();
        self.assistant_idx = None;
        self.autoscroll = true;
        self.invalidate_render_cache();
        self.scroll = self.scroll_max();
    }

    /// Switches the active conversation. Ordering matters: the outgoing
    /// transcript and canvas are captured before the selection pointer moves,
    /// and the incoming snapshot is applied before any new message can be
    /// appended, so messages never leak across conversations.
    pub(super) fn switch_conversation(&mut self, id: &str) -> bool {
        if id == self.conversations.selected_id() {
            return true;
        }
        if self.running {
            self.interrupt_running_task("agent turn interrupted by conversation switch");
        }
        self.sync_active();
        if !self.conversations.select(id) {
            return false;
        }
        self.load_selected();
        self.conversations.persist();
        true
    }
}
